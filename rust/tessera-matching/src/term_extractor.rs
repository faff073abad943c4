use crate::tree::{Node, TermData};

/// Collects the term data of every top-level term of `node`, in tree order.
///
/// Location terms are filters and are left out.
pub fn extract_terms(node: &Node) -> Vec<&TermData> {
    let mut terms = Vec::new();
    node.for_each_term(&mut |term| {
        if !term.is_location() {
            terms.push(term.data());
        }
    });
    terms
}
