//! The capability a physical index or attribute source exposes to the query
//! compiler: turn one term in one field into a leaf blueprint.

use tessera_common::Result;

use crate::blueprint::Blueprint;
use crate::field_spec::FieldSpec;

/// How the term text is to be matched against the field content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMatch {
    Word,
    Number,
    Prefix,
    Substring,
    Suffix,
    Range,
    Location,
    Regex,
    Predicate,
}

/// A single term as seen by a [`Searchable`].
///
/// `text` is the canonical string form of the term: numbers and words as given,
/// ranges as `[low;high]`, locations as the location specification.
#[derive(Debug, Clone, Copy)]
pub struct QueryTerm<'a> {
    text: &'a str,
    match_kind: TermMatch,
    weight: i32,
    unique_id: u32,
}

impl<'a> QueryTerm<'a> {
    pub fn new(text: &'a str, match_kind: TermMatch) -> QueryTerm<'a> {
        QueryTerm {
            text,
            match_kind,
            weight: 100,
            unique_id: 0,
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_unique_id(mut self, unique_id: u32) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn match_kind(&self) -> TermMatch {
        self.match_kind
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }
}

/// A searchable source of postings or attribute values.
///
/// Implementations must only estimate in `create_blueprint`; the actual
/// posting enumeration is deferred to [`LeafBlueprint::fetch_postings`].
///
/// [`LeafBlueprint::fetch_postings`]: crate::blueprint::LeafBlueprint::fetch_postings
pub trait Searchable: Send + Sync {
    fn create_blueprint(&self, field: &FieldSpec, term: &QueryTerm<'_>) -> Result<Blueprint>;
}
