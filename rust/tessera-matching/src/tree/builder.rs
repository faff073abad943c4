//! Prefix-order construction of query trees.
//!
//! Operators are added with their arity before their children, in the order a
//! serialized query lists them:
//!
//! ```
//! use tessera_matching::tree::{QueryBuilder, Weight};
//!
//! let mut builder = QueryBuilder::new();
//! builder.add_and(2).unwrap();
//! builder.add_string_term("foo", "title", 1, Weight::default()).unwrap();
//! builder
//!     .add_string_term("bar", "title", 2, Weight::new(50))
//!     .unwrap()
//!     .set_term_index(1);
//! let node = builder.build().unwrap();
//! assert_eq!(node.children().len(), 2);
//! ```

use tessera_common::{Result, error::Error};

use super::{Node, PredicateQuery, Proximity, Range, Term, TermData, TermKind, WandTerm, WeakAnd, Weight};

enum PendingOp {
    And,
    Or,
    AndNot,
    Rank,
    Near(u32),
    ONear(u32),
    WeakAnd { target_hits: u32, view: String },
    Phrase(TermData),
    WeightedSet(TermData),
    DotProduct(TermData),
    Wand {
        data: TermData,
        target_hits: u32,
        score_threshold: i64,
        threshold_boost_factor: f64,
    },
}

impl PendingOp {
    fn takes_terms_only(&self) -> bool {
        matches!(
            self,
            PendingOp::Phrase(_) | PendingOp::WeightedSet(_) | PendingOp::DotProduct(_) | PendingOp::Wand { .. }
        )
    }

    fn term_data_mut(&mut self) -> Option<&mut TermData> {
        match self {
            PendingOp::Phrase(data)
            | PendingOp::WeightedSet(data)
            | PendingOp::DotProduct(data)
            | PendingOp::Wand { data, .. } => Some(data),
            _ => None,
        }
    }
}

struct Pending {
    op: PendingOp,
    arity: usize,
    children: Vec<Node>,
}

impl Pending {
    fn is_complete(&self) -> bool {
        self.children.len() >= self.arity
    }

    fn into_node(self) -> Result<Node> {
        let children = self.children;
        let node = match self.op {
            PendingOp::And => Node::And(children),
            PendingOp::Or => Node::Or(children),
            PendingOp::AndNot => Node::AndNot(children),
            PendingOp::Rank => Node::Rank(children),
            PendingOp::Near(window) => Node::Near(Proximity { window, children }),
            PendingOp::ONear(window) => Node::ONear(Proximity { window, children }),
            PendingOp::WeakAnd { target_hits, view } => Node::WeakAnd(WeakAnd {
                target_hits,
                view,
                children,
            }),
            PendingOp::Phrase(data) => {
                Node::Term(Term::from_parts(data, TermKind::Phrase(into_terms(children)?)))
            }
            PendingOp::WeightedSet(data) => {
                Node::Term(Term::from_parts(data, TermKind::WeightedSet(into_terms(children)?)))
            }
            PendingOp::DotProduct(data) => {
                Node::Term(Term::from_parts(data, TermKind::DotProduct(into_terms(children)?)))
            }
            PendingOp::Wand {
                data,
                target_hits,
                score_threshold,
                threshold_boost_factor,
            } => {
                let wand = WandTerm {
                    target_hits,
                    score_threshold,
                    threshold_boost_factor,
                    children: into_terms(children)?,
                };
                Node::Term(Term::from_parts(data, TermKind::Wand(wand)))
            }
        };
        Ok(node)
    }
}

fn into_terms(children: Vec<Node>) -> Result<Vec<Term>> {
    children
        .into_iter()
        .map(|child| match child {
            Node::Term(term) if !term.is_composite() => Ok(term),
            _ => Err(Error::invalid_arg(
                "child",
                "term composites only take simple terms",
            )),
        })
        .collect()
}

/// Builds a [`Node`] tree from operators and terms added in prefix order.
///
/// Every adder fails with `InvalidOperation` once the tree is complete, and
/// with `InvalidArgument` when anything but a simple term is added below a
/// term composite.
#[derive(Default)]
pub struct QueryBuilder {
    stack: Vec<Pending>,
    root: Option<Node>,
}

impl QueryBuilder {
    pub fn new() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn add_and(&mut self, arity: usize) -> Result<()> {
        self.push_op(PendingOp::And, arity)
    }

    pub fn add_or(&mut self, arity: usize) -> Result<()> {
        self.push_op(PendingOp::Or, arity)
    }

    pub fn add_and_not(&mut self, arity: usize) -> Result<()> {
        self.push_op(PendingOp::AndNot, arity)
    }

    pub fn add_rank(&mut self, arity: usize) -> Result<()> {
        self.push_op(PendingOp::Rank, arity)
    }

    pub fn add_near(&mut self, arity: usize, window: u32) -> Result<()> {
        self.push_op(PendingOp::Near(window), arity)
    }

    pub fn add_onear(&mut self, arity: usize, window: u32) -> Result<()> {
        self.push_op(PendingOp::ONear(window), arity)
    }

    pub fn add_weak_and(&mut self, arity: usize, target_hits: u32, view: impl Into<String>) -> Result<()> {
        let view = view.into();
        self.push_op(PendingOp::WeakAnd { target_hits, view }, arity)
    }

    pub fn add_phrase(
        &mut self,
        arity: usize,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        let data = TermData::new(view, unique_id, weight);
        self.push_term_op(PendingOp::Phrase(data), arity)
    }

    pub fn add_weighted_set_term(
        &mut self,
        arity: usize,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        let data = TermData::new(view, unique_id, weight);
        self.push_term_op(PendingOp::WeightedSet(data), arity)
    }

    pub fn add_dot_product(
        &mut self,
        arity: usize,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        let data = TermData::new(view, unique_id, weight);
        self.push_term_op(PendingOp::DotProduct(data), arity)
    }

    /// Adds a parallel weak-and term over the next `arity` simple terms.
    ///
    /// # Arguments
    ///
    /// * `target_hits` - Number of top scores tracked.
    /// * `score_threshold` - Initial score a document must exceed.
    /// * `threshold_boost_factor` - Factor applied to the smallest tracked
    ///   score when raising the threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn add_wand_term(
        &mut self,
        arity: usize,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
        target_hits: u32,
        score_threshold: i64,
        threshold_boost_factor: f64,
    ) -> Result<&mut TermData> {
        let op = PendingOp::Wand {
            data: TermData::new(view, unique_id, weight),
            target_hits,
            score_threshold,
            threshold_boost_factor,
        };
        self.push_term_op(op, arity)
    }

    pub fn add_number_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Number(term.into()), view, unique_id, weight)
    }

    pub fn add_string_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::String(term.into()), view, unique_id, weight)
    }

    pub fn add_prefix_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Prefix(term.into()), view, unique_id, weight)
    }

    pub fn add_substring_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Substring(term.into()), view, unique_id, weight)
    }

    pub fn add_suffix_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Suffix(term.into()), view, unique_id, weight)
    }

    pub fn add_range_term(
        &mut self,
        range: Range,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Range(range), view, unique_id, weight)
    }

    pub fn add_location_term(
        &mut self,
        location: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Location(location.into()), view, unique_id, weight)
    }

    pub fn add_regexp_term(
        &mut self,
        term: impl Into<String>,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::RegExp(term.into()), view, unique_id, weight)
    }

    pub fn add_predicate_query(
        &mut self,
        predicate: PredicateQuery,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        self.add_term(TermKind::Predicate(predicate), view, unique_id, weight)
    }

    /// Adds a fully formed term.
    pub fn add_term(
        &mut self,
        kind: TermKind,
        view: impl Into<String>,
        unique_id: u32,
        weight: Weight,
    ) -> Result<&mut TermData> {
        let term = Term::new(kind, view, unique_id, weight);
        let node = self.push_node(Node::Term(term))?;
        match node {
            Node::Term(term) => Ok(term.data_mut()),
            _ => Err(Error::invalid_operation("add_term")),
        }
    }

    /// Adds a complete subtree.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.push_node(node).map(|_| ())
    }

    /// Returns the finished tree.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if nothing was added or if an operator is
    /// still missing children.
    pub fn build(mut self) -> Result<Node> {
        self.collapse()?;
        if !self.stack.is_empty() {
            return Err(Error::invalid_operation(format!(
                "build: {} operator(s) still missing children",
                self.stack.len()
            )));
        }
        self.root
            .take()
            .ok_or_else(|| Error::invalid_operation("build: empty query"))
    }

    fn push_op(&mut self, op: PendingOp, arity: usize) -> Result<()> {
        self.begin_child()?;
        self.stack.push(Pending {
            op,
            arity,
            children: Vec::new(),
        });
        Ok(())
    }

    fn push_term_op(&mut self, op: PendingOp, arity: usize) -> Result<&mut TermData> {
        self.push_op(op, arity)?;
        self.stack
            .last_mut()
            .and_then(|pending| pending.op.term_data_mut())
            .ok_or_else(|| Error::invalid_operation("push_term_op"))
    }

    /// Checks that a new operator may be added at the current position.
    fn begin_child(&mut self) -> Result<()> {
        self.collapse()?;
        match self.stack.last() {
            None if self.root.is_some() => Err(Error::invalid_operation("add: query tree is complete")),
            Some(parent) if parent.op.takes_terms_only() => {
                Err(Error::invalid_arg("child", "term composites only take simple terms"))
            }
            _ => Ok(()),
        }
    }

    fn push_node(&mut self, node: Node) -> Result<&mut Node> {
        self.collapse()?;
        if self.stack.is_empty() {
            if self.root.is_some() {
                return Err(Error::invalid_operation("add: query tree is complete"));
            }
            return Ok(self.root.insert(node));
        }
        let last = self.stack.len() - 1;
        let parent = &mut self.stack[last];
        if parent.op.takes_terms_only() && !matches!(&node, Node::Term(t) if !t.is_composite()) {
            return Err(Error::invalid_arg("child", "term composites only take simple terms"));
        }
        if parent.is_complete() {
            return Err(Error::invalid_operation("add: operator has all its children"));
        }
        let idx = parent.children.len();
        parent.children.push(node);
        Ok(&mut parent.children[idx])
    }

    /// Pops every operator that has received all its children. Completion is
    /// deferred to the next add so that the last added term stays reachable
    /// for the caller.
    fn collapse(&mut self) -> Result<()> {
        while self.stack.last().is_some_and(Pending::is_complete) {
            let Some(pending) = self.stack.pop() else {
                break;
            };
            let node = pending.into_node()?;
            match self.stack.last_mut() {
                Some(parent) if parent.is_complete() => {
                    return Err(Error::invalid_operation("add: operator has all its children"));
                }
                Some(parent) => parent.children.push(node),
                None => {
                    if self.root.is_some() {
                        return Err(Error::invalid_operation("add: query tree is complete"));
                    }
                    self.root = Some(node);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("pending", &self.stack.len())
            .field("root", &self.root)
            .finish()
    }
}
