//! What a query is evaluated against: the physical index sources, the
//! attributes, and the document id space.

use std::sync::Arc;

use tessera_queryeval::Searchable;
use tessera_queryeval::search::DocId;
use tessera_queryeval::source_selector::{SourceId, SourceSelector};

/// One physical index source of a search context.
#[derive(Clone, Copy)]
pub struct IndexSource<'a> {
    pub source_id: SourceId,
    pub searchable: &'a dyn Searchable,
}

/// Search context of one query.
///
/// Index-backed fields are looked up in every index source and blended
/// through the source selector when there is one; attribute-backed fields are
/// looked up in [`attributes`](Self::attributes) only.
pub trait SearchContext: Send + Sync {
    fn index_sources(&self) -> Vec<IndexSource<'_>>;

    fn attributes(&self) -> &dyn Searchable;

    /// Owner of each document id among the index sources, if the sources are
    /// to be blended.
    fn source_selector(&self) -> Option<Arc<dyn SourceSelector>>;

    /// Exclusive upper bound of the document id space. Document id 0 is
    /// reserved, so the context holds at most `docid_limit() - 1` documents.
    fn docid_limit(&self) -> DocId;
}
