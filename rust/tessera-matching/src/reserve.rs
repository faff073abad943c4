//! Match-data reservation.
//!
//! Walks the resolved tree depth-first in child order and allocates one handle
//! per resolved field of every top-level term. Children of term composites are
//! skipped; the composite's blueprint gives them handles in a private layout.

use tessera_queryeval::match_data::MatchDataLayout;

use crate::tree::{Node, Term};

/// Reserves handles for every top-level term of `node`.
pub fn reserve_handles(node: &mut Node, layout: &mut MatchDataLayout) {
    node.for_each_term_mut(&mut |term| reserve_term(term, layout));
}

/// Reserves one handle per resolved field of `term`.
pub fn reserve_term(term: &mut Term, layout: &mut MatchDataLayout) {
    for field in term.data_mut().fields_mut() {
        let handle = layout.alloc_term_field(field.field_id());
        field.set_handle(handle);
    }
}
