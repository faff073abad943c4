//! Source selectors map each document id to the one physical index source that
//! owns it. Source blending consults the selector so that a document is only
//! ever reported by its owner, which also makes the selector a blacklisting
//! mechanism: pointing a document at a source without data for it hides it.

use crate::search::DocId;

pub type SourceId = u8;

pub trait SourceSelector: Send + Sync {
    fn source_of(&self, doc_id: DocId) -> SourceId;
}

/// Selector with a default source and explicit per-document overrides.
#[derive(Debug, Clone)]
pub struct FixedSourceSelector {
    default_source: SourceId,
    sources: Vec<SourceId>,
}

impl FixedSourceSelector {
    /// Creates a selector assigning `default_source` to every document, with room
    /// for `initial_num_docs` overrides before growing.
    pub fn new(default_source: SourceId, initial_num_docs: usize) -> FixedSourceSelector {
        FixedSourceSelector {
            default_source,
            sources: vec![default_source; initial_num_docs],
        }
    }

    pub fn default_source(&self) -> SourceId {
        self.default_source
    }

    pub fn set_source(&mut self, doc_id: DocId, source: SourceId) -> &mut Self {
        let idx = doc_id as usize;
        if idx >= self.sources.len() {
            self.sources.resize(idx + 1, self.default_source);
        }
        self.sources[idx] = source;
        self
    }
}

impl SourceSelector for FixedSourceSelector {
    fn source_of(&self, doc_id: DocId) -> SourceId {
        self.sources
            .get(doc_id as usize)
            .copied()
            .unwrap_or(self.default_source)
    }
}
