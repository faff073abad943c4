//! In-memory [`SearchContext`] over [`FakeSearchable`]s, for tests.

use std::sync::Arc;

use tessera_queryeval::Searchable;
use tessera_queryeval::fake::FakeSearchable;
use tessera_queryeval::search::DocId;
use tessera_queryeval::source_selector::{FixedSourceSelector, SourceId, SourceSelector};

use crate::search_context::{IndexSource, SearchContext};

/// Search context with any number of fake index sources, one fake attribute
/// source and a fixed source selector defaulting to source 0.
pub struct FakeSearchContext {
    indexes: Vec<(SourceId, FakeSearchable)>,
    attributes: FakeSearchable,
    selector: Arc<FixedSourceSelector>,
    docid_limit: DocId,
}

impl FakeSearchContext {
    /// Creates a context whose document id limit is `initial_num_docs`.
    pub fn new(initial_num_docs: u32) -> FakeSearchContext {
        let mut attributes = FakeSearchable::new();
        attributes.set_tag("attr");
        FakeSearchContext {
            indexes: Vec::new(),
            attributes,
            selector: Arc::new(FixedSourceSelector::new(0, initial_num_docs as usize)),
            docid_limit: initial_num_docs,
        }
    }

    /// Adds an empty index source with the given source id.
    pub fn add_idx(&mut self, source_id: SourceId) -> &mut Self {
        let mut searchable = FakeSearchable::new();
        searchable.set_tag(format!("idx{}", self.indexes.len()));
        self.indexes.push((source_id, searchable));
        self
    }

    /// The `i`-th added index source.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `i + 1` sources were added.
    pub fn idx(&mut self, i: usize) -> &mut FakeSearchable {
        &mut self.indexes[i].1
    }

    pub fn attr(&mut self) -> &mut FakeSearchable {
        &mut self.attributes
    }

    pub fn selector_mut(&mut self) -> &mut FixedSourceSelector {
        Arc::make_mut(&mut self.selector)
    }

    pub fn set_limit(&mut self, docid_limit: DocId) -> &mut Self {
        self.docid_limit = docid_limit;
        self
    }
}

impl Default for FakeSearchContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SearchContext for FakeSearchContext {
    fn index_sources(&self) -> Vec<IndexSource<'_>> {
        self.indexes
            .iter()
            .map(|(source_id, searchable)| IndexSource {
                source_id: *source_id,
                searchable: searchable as &dyn Searchable,
            })
            .collect()
    }

    fn attributes(&self) -> &dyn Searchable {
        &self.attributes
    }

    fn source_selector(&self) -> Option<Arc<dyn SourceSelector>> {
        let selector: Arc<dyn SourceSelector> = self.selector.clone();
        Some(selector)
    }

    fn docid_limit(&self) -> DocId {
        self.docid_limit
    }
}
