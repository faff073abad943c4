//! Compilation of search queries into executable plans.
//!
//! # Overview
//!
//! A [`Query`] takes a serialized query tree through the following passes:
//!
//! - [`tree::stack_dump`] decodes the tree, and [`location`] adds an optional
//!   geo filter.
//! - [`resolve_view`] binds each term to the physical fields its view maps to
//!   ([`ViewResolver`]), dropping fields the schema does not know.
//! - [`reserve`] allocates one match-data handle per resolved term field.
//! - [`blueprint_builder`] looks every term up in the [`SearchContext`] and
//!   assembles the blueprint tree, blending index sources through the source
//!   selector.
//!
//! The resulting plan is optimized, its postings are fetched, and a search
//! iterator is created for a match-data buffer. [`term_extractor`] exposes the
//! ranked terms to ranking code.

pub mod blueprint_builder;
pub mod config;
pub mod fake_search_context;
pub mod location;
pub mod query;
pub mod request_context;
pub mod reserve;
pub mod resolve_view;
pub mod search_context;
pub mod term_extractor;
pub mod tree;
pub mod view_resolver;

pub use config::MatchingConfig;
pub use query::{Query, QueryState};
pub use request_context::RequestContext;
pub use search_context::{IndexSource, SearchContext};
pub use view_resolver::ViewResolver;
