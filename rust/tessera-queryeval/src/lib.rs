//! Query evaluation building blocks: match data, blueprints and search iterators.
//!
//! # Overview
//!
//! - [`match_data`]: per-query handle allocation and the buffer iterators unpack
//!   term occurrences into.
//! - [`blueprint`]: cost-annotated execution plans, their optimization and the
//!   transition to iterators.
//! - [`search`]: pull-based iterators enumerating matching documents in
//!   increasing document id order.
//! - [`searchable`]: the capability a posting or attribute source implements to
//!   take part in a query.
//! - [`fake`] and [`simple`]: in-memory sources and document lists used for
//!   blacklists and tests.

pub mod blueprint;
pub mod estimate;
pub mod fake;
pub mod field_spec;
pub mod index_env;
pub mod match_data;
pub mod search;
pub mod searchable;
pub mod simple;
pub mod source_selector;

pub use blueprint::{Blueprint, FetchedBlueprint, LeafBlueprint};
pub use estimate::HitEstimate;
pub use field_spec::FieldSpec;
pub use match_data::{MatchData, MatchDataLayout, TermFieldHandle};
pub use search::{BEGIN_DOC_ID, DocId, END_DOC_ID, SearchIterator};
pub use searchable::{QueryTerm, Searchable, TermMatch};
