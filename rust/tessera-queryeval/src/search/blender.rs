use std::sync::Arc;

use crate::match_data::MatchData;
use crate::source_selector::{SourceId, SourceSelector};

use super::{DocId, SearchCursor, SearchIterator, init_children};

/// Merges per-source iterators so that each document is reported only by the
/// source the selector names as its owner.
///
/// A hit from a source that does not own the document is skipped, which makes
/// the blender double as a blacklist: pointing a document at a source that has
/// no data for it suppresses the document entirely.
pub struct SourceBlenderSearch {
    cursor: SearchCursor,
    selector: Arc<dyn SourceSelector>,
    sources: Vec<SourceId>,
    children: Vec<Box<dyn SearchIterator>>,
    current: Option<usize>,
}

impl SourceBlenderSearch {
    pub fn new(
        selector: Arc<dyn SourceSelector>,
        children: Vec<(SourceId, Box<dyn SearchIterator>)>,
    ) -> SourceBlenderSearch {
        let (sources, children) = children.into_iter().unzip();
        SourceBlenderSearch {
            cursor: SearchCursor::new(),
            selector,
            sources,
            children,
            current: None,
        }
    }

    fn owner_at(&self, doc_id: DocId) -> Option<usize> {
        let owner = self.selector.source_of(doc_id);
        self.sources
            .iter()
            .zip(self.children.iter())
            .position(|(&source, child)| source == owner && child.doc_id() == doc_id)
    }
}

impl SearchIterator for SourceBlenderSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
        self.current = None;
    }

    fn do_seek(&mut self, mut target: DocId) {
        loop {
            let next = super::seek_any(&mut self.children, target);
            if next >= self.cursor.end_id() {
                self.current = None;
                self.cursor.set_at_end();
                return;
            }
            if let Some(idx) = self.owner_at(next) {
                self.current = Some(idx);
                self.cursor.set_doc_id(next);
                return;
            }
            target = next + 1;
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        if let Some(idx) = self.current {
            self.children[idx].unpack(doc_id, md);
        }
    }

    fn as_string(&self) -> String {
        let children = self
            .sources
            .iter()
            .zip(self.children.iter())
            .map(|(source, child)| format!("{source}: {}", child.as_string()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SourceBlenderSearch[{children}]")
    }
}
