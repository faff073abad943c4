//! Plain document-id lists as blueprints and iterators.
//!
//! Used for externally computed document sets such as blacklists, and for
//! collecting the hits of an iterator in tests.

use std::fmt;

use tessera_common::Result;

use crate::blueprint::LeafBlueprint;
use crate::estimate::HitEstimate;
use crate::match_data::MatchData;
use crate::search::{BEGIN_DOC_ID, DocId, SearchCursor, SearchIterator};

/// Sorted, de-duplicated list of document ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleResult {
    hits: Vec<DocId>,
}

impl SimpleResult {
    pub fn new() -> SimpleResult {
        SimpleResult::default()
    }

    /// Adds a hit, keeping the list sorted.
    pub fn add_hit(&mut self, doc_id: DocId) -> &mut Self {
        if let Err(pos) = self.hits.binary_search(&doc_id) {
            self.hits.insert(pos, doc_id);
        }
        self
    }

    pub fn hits(&self) -> &[DocId] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.hits.binary_search(&doc_id).is_ok()
    }

    /// Replaces the content with every hit of `search` after its current
    /// position.
    ///
    /// `search` must already have its range initialized.
    pub fn search(&mut self, search: &mut dyn SearchIterator) -> &mut Self {
        self.hits.clear();
        let mut target = search.doc_id().saturating_add(1).max(BEGIN_DOC_ID);
        while !search.is_at_end() {
            if search.seek(target) {
                self.hits.push(target);
                target += 1;
            } else if !search.is_at_end() {
                target = search.doc_id();
            }
        }
        self
    }
}

impl FromIterator<DocId> for SimpleResult {
    fn from_iter<I: IntoIterator<Item = DocId>>(iter: I) -> Self {
        let mut hits = iter.into_iter().collect::<Vec<_>>();
        hits.sort_unstable();
        hits.dedup();
        SimpleResult { hits }
    }
}

impl fmt::Display for SimpleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.hits)
    }
}

/// Leaf blueprint over a [`SimpleResult`]. It matches without match data.
#[derive(Debug, Clone)]
pub struct SimpleBlueprint {
    result: SimpleResult,
    tag: String,
}

impl SimpleBlueprint {
    pub fn new(result: SimpleResult) -> SimpleBlueprint {
        SimpleBlueprint {
            result,
            tag: String::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl LeafBlueprint for SimpleBlueprint {
    fn estimate(&self) -> HitEstimate {
        HitEstimate::new(self.result.len() as u32)
    }

    fn fetch_postings(&mut self, _strict: bool) -> Result<()> {
        Ok(())
    }

    fn create_leaf_search(&self, _md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        Ok(Box::new(SimpleSearch::new(self.result.clone(), self.tag.clone())))
    }

    fn describe(&self) -> String {
        format!("Simple(tag={}, hits={})", self.tag, self.result.len())
    }
}

/// Iterator over a [`SimpleResult`].
pub struct SimpleSearch {
    cursor: SearchCursor,
    result: SimpleResult,
    tag: String,
    next: usize,
}

impl SimpleSearch {
    pub fn new(result: SimpleResult, tag: String) -> SimpleSearch {
        SimpleSearch {
            cursor: SearchCursor::new(),
            result,
            tag,
            next: 0,
        }
    }
}

impl SearchIterator for SimpleSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        self.next = 0;
    }

    fn do_seek(&mut self, target: DocId) {
        let hits = self.result.hits();
        self.next += hits[self.next..].partition_point(|&d| d < target);
        match hits.get(self.next) {
            Some(&doc_id) => self.cursor.set_doc_id(doc_id),
            None => self.cursor.set_at_end(),
        }
    }

    fn unpack(&mut self, _doc_id: DocId, _md: &mut MatchData) {}

    fn as_string(&self) -> String {
        format!("SimpleSearch(tag={}, hits={})", self.tag, self.result)
    }
}
