//! Binds the terms of a query tree to physical fields.
//!
//! Each term's view is expanded through the [`ViewResolver`] and the result is
//! filtered against the index schema. Fields the schema does not know, and
//! phrases on attribute fields (attributes carry no positions), are dropped
//! without error; a term left without fields is inert and matches nothing.

use tessera_queryeval::index_env::IndexEnvironment;

use crate::tree::{Node, Term, TermFieldData, TermKind};
use crate::view_resolver::ViewResolver;

/// Resolves every top-level term of `node`.
pub fn resolve_views(node: &mut Node, resolver: &ViewResolver, env: &dyn IndexEnvironment) {
    node.for_each_term_mut(&mut |term| resolve_term(term, resolver, env));
}

/// Resolves one term, replacing any previously resolved fields.
///
/// Children of a term composite get the same field list as the composite.
pub fn resolve_term(term: &mut Term, resolver: &ViewResolver, env: &dyn IndexEnvironment) {
    let is_phrase = matches!(term.kind(), TermKind::Phrase(_));
    let mut fields = Vec::new();
    for name in resolver.resolve(term.data().view()) {
        match env.field_by_name(&name) {
            None => {
                log::debug!("view '{}': unknown field '{name}' dropped", term.data().view());
            }
            Some(info) if is_phrase && info.is_attribute() => {
                log::debug!("view '{}': phrase on attribute '{name}' dropped", term.data().view());
            }
            Some(info) => fields.push(TermFieldData::new(info.name(), info.id(), info.is_attribute())),
        }
    }
    for child in term.children_mut() {
        child.data_mut().set_fields(fields.clone());
    }
    term.data_mut().set_fields(fields);
}
