//! Blueprints: cost-annotated, lazily materialized execution plans.
//!
//! # Overview
//!
//! A [`Blueprint`] tree mirrors the logical shape of a query. Every node exposes
//! a [`HitEstimate`] that is computed bottom-up from its children, which lets the
//! tree be rewritten by [`Blueprint::optimize`] before any posting list is
//! touched.
//!
//! # Life cycle
//!
//! 1. The tree is built from leaves produced by a
//!    [`Searchable`](crate::searchable::Searchable) and the composite constructors
//!    in this module.
//! 2. [`Blueprint::optimize`] optionally prunes and reorders it without changing
//!    the set of matched documents.
//! 3. [`Blueprint::fetch_postings`] materializes the posting enumeration of every
//!    leaf and consumes the blueprint, returning a [`FetchedBlueprint`].
//! 4. [`FetchedBlueprint::create_search`] instantiates the
//!    [`SearchIterator`] tree bound to one [`MatchData`] buffer.
//!
//! Since only a [`FetchedBlueprint`] can create iterators, creating a search
//! before postings are fetched does not compile.

use std::sync::Arc;

use tessera_common::Result;

use crate::estimate::HitEstimate;
use crate::match_data::{MatchData, TermFieldHandle};
use crate::search::SearchIterator;
use crate::search::blender::SourceBlenderSearch;
use crate::search::intermediate::{AndNotSearch, AndSearch, OrSearch, RankSearch};
use crate::source_selector::{SourceId, SourceSelector};

pub mod optimize;
pub mod positional;
pub mod weighted;

pub use optimize::OptimizeOptions;
pub use positional::{NearBlueprint, PhraseBlueprint};
pub use weighted::{ParallelWeakAndBlueprint, WeakAndBlueprint, WeightedSetBlueprint};

/// A leaf of the blueprint tree, provided by a posting or attribute source.
///
/// # Implementation Guidelines
///
/// - [`estimate`](Self::estimate) must be cheap and available right after
///   construction; it drives optimization.
/// - The actual posting enumeration belongs in
///   [`fetch_postings`](Self::fetch_postings), which is called exactly once
///   before any search is created.
/// - Every handle an iterator unpacks into must be reported by
///   [`handles`](Self::handles), so that positional parents can read the
///   unpacked occurrences back.
pub trait LeafBlueprint: Send {
    fn estimate(&self) -> HitEstimate;

    /// Materializes the postings of this leaf.
    ///
    /// # Arguments
    ///
    /// * `strict` - Whether the resulting iterator is expected to be driven by
    ///   unpositioned forward seeks (as opposed to being probed by a parent
    ///   that already has a candidate).
    ///
    /// # Errors
    ///
    /// Returns `SearchContext` errors raised by the underlying source. The
    /// failure is not retried.
    fn fetch_postings(&mut self, strict: bool) -> Result<()>;

    /// Creates the iterator of this leaf, bound to `md`.
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` if a handle of this leaf does not address a slot
    /// of `md`.
    fn create_leaf_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>>;

    /// Diagnostic description, distinguishing leaves by source, field and term.
    fn describe(&self) -> String;

    /// Match-data handles the leaf's iterator writes to.
    fn handles(&self) -> Vec<TermFieldHandle> {
        Vec::new()
    }
}

/// Blends per-source blueprints of the same term through a source selector.
pub struct SourceBlenderBlueprint {
    selector: Arc<dyn SourceSelector>,
    children: Vec<(SourceId, Blueprint)>,
}

impl SourceBlenderBlueprint {
    pub fn new(
        selector: Arc<dyn SourceSelector>,
        children: Vec<(SourceId, Blueprint)>,
    ) -> SourceBlenderBlueprint {
        SourceBlenderBlueprint { selector, children }
    }

    pub fn children(&self) -> &[(SourceId, Blueprint)] {
        &self.children
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn SourceSelector>, Vec<(SourceId, Blueprint)>) {
        (self.selector, self.children)
    }
}

/// An execution plan node.
///
/// Intermediate variants combine already built children; [`Blueprint::Leaf`]
/// wraps source-provided leaves and [`Blueprint::Empty`] is the canonical plan
/// that matches nothing. The optional label of an empty blueprint names what
/// it stands for (e.g. a term with no hits) and shows up in diagnostics.
pub enum Blueprint {
    Empty(Option<String>),
    Leaf(Box<dyn LeafBlueprint>),
    And(Vec<Blueprint>),
    Or(Vec<Blueprint>),
    /// The first child minus any document matched by the others.
    AndNot(Vec<Blueprint>),
    /// The first child matches; the others only add match data.
    Rank(Vec<Blueprint>),
    SourceBlender(SourceBlenderBlueprint),
    Near(NearBlueprint),
    ONear(NearBlueprint),
    Phrase(PhraseBlueprint),
    WeakAnd(WeakAndBlueprint),
    ParallelWeakAnd(ParallelWeakAndBlueprint),
    WeightedSet(WeightedSetBlueprint),
    DotProduct(WeightedSetBlueprint),
}

impl Blueprint {
    pub fn empty() -> Blueprint {
        Blueprint::Empty(None)
    }

    pub fn empty_with_label(label: impl Into<String>) -> Blueprint {
        Blueprint::Empty(Some(label.into()))
    }

    pub fn leaf(leaf: impl LeafBlueprint + 'static) -> Blueprint {
        Blueprint::Leaf(Box::new(leaf))
    }

    /// Returns true if this blueprint is estimated to match nothing.
    pub fn is_empty(&self) -> bool {
        self.estimate().is_empty()
    }

    pub fn estimate(&self) -> HitEstimate {
        match self {
            Blueprint::Empty(_) => HitEstimate::empty(),
            Blueprint::Leaf(leaf) => leaf.estimate(),
            Blueprint::And(children) => HitEstimate::intersect(children.iter().map(Self::estimate)),
            Blueprint::Or(children) => HitEstimate::union(children.iter().map(Self::estimate)),
            Blueprint::AndNot(children) | Blueprint::Rank(children) => children
                .first()
                .map_or_else(HitEstimate::empty, Self::estimate),
            Blueprint::SourceBlender(blender) => {
                HitEstimate::union(blender.children.iter().map(|(_, c)| c.estimate()))
            }
            Blueprint::Near(near) | Blueprint::ONear(near) => near.estimate(),
            Blueprint::Phrase(phrase) => phrase.estimate(),
            Blueprint::WeakAnd(wand) => wand.estimate(),
            Blueprint::ParallelWeakAnd(wand) => wand.estimate(),
            Blueprint::WeightedSet(ws) | Blueprint::DotProduct(ws) => ws.estimate(),
        }
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        match self {
            Blueprint::Empty(_) | Blueprint::Leaf(_) => 0,
            Blueprint::And(children)
            | Blueprint::Or(children)
            | Blueprint::AndNot(children)
            | Blueprint::Rank(children) => children.len(),
            Blueprint::SourceBlender(blender) => blender.children.len(),
            Blueprint::Near(near) | Blueprint::ONear(near) => near.children().len(),
            Blueprint::Phrase(phrase) => phrase.children().len(),
            Blueprint::WeakAnd(wand) => wand.child_count(),
            Blueprint::ParallelWeakAnd(wand) => wand.children().len(),
            Blueprint::WeightedSet(ws) | Blueprint::DotProduct(ws) => ws.children().len(),
        }
    }

    /// Match-data handles of the shared layout that iterators created from
    /// this tree write to, in tree order.
    ///
    /// Term composites with a private child layout report only their own
    /// output handle.
    pub fn handles(&self) -> Vec<TermFieldHandle> {
        let mut handles = Vec::new();
        self.collect_handles(&mut handles);
        handles
    }

    fn collect_handles(&self, out: &mut Vec<TermFieldHandle>) {
        match self {
            Blueprint::Empty(_) => {}
            Blueprint::Leaf(leaf) => out.extend(leaf.handles()),
            Blueprint::And(children)
            | Blueprint::Or(children)
            | Blueprint::AndNot(children)
            | Blueprint::Rank(children) => {
                children.iter().for_each(|c| c.collect_handles(out));
            }
            Blueprint::SourceBlender(blender) => {
                blender.children.iter().for_each(|(_, c)| c.collect_handles(out));
            }
            Blueprint::Near(near) | Blueprint::ONear(near) => {
                near.children().iter().for_each(|c| c.collect_handles(out));
            }
            Blueprint::WeakAnd(wand) => {
                wand.children().iter().for_each(|c| c.collect_handles(out));
            }
            Blueprint::Phrase(phrase) => out.push(phrase.field().handle()),
            Blueprint::ParallelWeakAnd(wand) => out.push(wand.field().handle()),
            Blueprint::WeightedSet(ws) | Blueprint::DotProduct(ws) => out.push(ws.field().handle()),
        }
    }

    /// Diagnostic description of the tree.
    pub fn as_string(&self) -> String {
        fn list(children: &[Blueprint]) -> String {
            children
                .iter()
                .map(Blueprint::as_string)
                .collect::<Vec<_>>()
                .join(", ")
        }

        match self {
            Blueprint::Empty(None) => "Empty".to_string(),
            Blueprint::Empty(Some(label)) => format!("Empty({label})"),
            Blueprint::Leaf(leaf) => leaf.describe(),
            Blueprint::And(children) => format!("And[{}]", list(children)),
            Blueprint::Or(children) => format!("Or[{}]", list(children)),
            Blueprint::AndNot(children) => format!("AndNot[{}]", list(children)),
            Blueprint::Rank(children) => format!("Rank[{}]", list(children)),
            Blueprint::SourceBlender(blender) => {
                let children = blender
                    .children
                    .iter()
                    .map(|(source, child)| format!("{source}: {}", child.as_string()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("SourceBlender[{children}]")
            }
            Blueprint::Near(near) => {
                format!("Near(window={})[{}]", near.window(), list(near.children()))
            }
            Blueprint::ONear(near) => {
                format!("ONear(window={})[{}]", near.window(), list(near.children()))
            }
            Blueprint::Phrase(phrase) => {
                format!("Phrase(field={})[{}]", phrase.field().name(), list(phrase.children()))
            }
            Blueprint::WeakAnd(wand) => {
                format!("WeakAnd(n={})[{}]", wand.n(), list(wand.children()))
            }
            Blueprint::ParallelWeakAnd(wand) => format!(
                "ParallelWeakAnd(field={}, n={}, threshold={}, boost={})[{}]",
                wand.field().name(),
                wand.scores_to_track(),
                wand.score_threshold(),
                wand.threshold_boost_factor(),
                list(wand.children())
            ),
            Blueprint::WeightedSet(ws) => {
                format!("WeightedSet(field={})[{}]", ws.field().name(), list(ws.children()))
            }
            Blueprint::DotProduct(ws) => {
                format!("DotProduct(field={})[{}]", ws.field().name(), list(ws.children()))
            }
        }
    }

    /// Materializes the postings of every leaf and seals the tree.
    ///
    /// The strictness hint is passed to the first (driving) child of
    /// intersections and differences and to all children of unions; the other
    /// children are only probed on candidates and fetched non-strict.
    ///
    /// # Errors
    ///
    /// Fails with the first error reported by a leaf. The partially fetched
    /// tree is dropped.
    pub fn fetch_postings(mut self, strict: bool) -> Result<FetchedBlueprint> {
        self.fetch(strict)?;
        Ok(FetchedBlueprint(self))
    }

    fn fetch(&mut self, strict: bool) -> Result<()> {
        fn driving_first(children: &mut [Blueprint], strict: bool) -> Result<()> {
            for (i, child) in children.iter_mut().enumerate() {
                child.fetch(strict && i == 0)?;
            }
            Ok(())
        }

        fn all(children: &mut [Blueprint], strict: bool) -> Result<()> {
            children.iter_mut().try_for_each(|c| c.fetch(strict))
        }

        match self {
            Blueprint::Empty(_) => Ok(()),
            Blueprint::Leaf(leaf) => leaf.fetch_postings(strict),
            Blueprint::And(children) | Blueprint::AndNot(children) | Blueprint::Rank(children) => {
                driving_first(children, strict)
            }
            Blueprint::Or(children) => all(children, strict),
            Blueprint::SourceBlender(blender) => blender
                .children
                .iter_mut()
                .try_for_each(|(_, c)| c.fetch(strict)),
            Blueprint::Near(near) | Blueprint::ONear(near) => {
                driving_first(near.children_mut(), strict)
            }
            Blueprint::Phrase(phrase) => driving_first(phrase.children_mut(), strict),
            Blueprint::WeakAnd(wand) => all(wand.children_mut(), strict),
            Blueprint::ParallelWeakAnd(wand) => all(wand.children_mut(), strict),
            Blueprint::WeightedSet(ws) | Blueprint::DotProduct(ws) => {
                all(ws.children_mut(), strict)
            }
        }
    }

    fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        fn searches(children: &[Blueprint], md: &MatchData) -> Result<Vec<Box<dyn SearchIterator>>> {
            children.iter().map(|c| c.create_search(md)).collect()
        }

        let search: Box<dyn SearchIterator> = match self {
            Blueprint::Empty(label) => Box::new(crate::search::EmptySearch::new(label.clone())),
            Blueprint::Leaf(leaf) => leaf.create_leaf_search(md)?,
            Blueprint::And(children) => Box::new(AndSearch::new(searches(children, md)?)),
            Blueprint::Or(children) => Box::new(OrSearch::new(searches(children, md)?)),
            Blueprint::AndNot(children) => Box::new(AndNotSearch::new(searches(children, md)?)),
            Blueprint::Rank(children) => Box::new(RankSearch::new(searches(children, md)?)),
            Blueprint::SourceBlender(blender) => {
                let children = blender
                    .children
                    .iter()
                    .map(|(source, child)| -> Result<(SourceId, Box<dyn SearchIterator>)> {
                        Ok((*source, child.create_search(md)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Box::new(SourceBlenderSearch::new(blender.selector.clone(), children))
            }
            Blueprint::Near(near) => near.create_search(md, false)?,
            Blueprint::ONear(near) => near.create_search(md, true)?,
            Blueprint::Phrase(phrase) => phrase.create_search(md)?,
            Blueprint::WeakAnd(wand) => wand.create_search(md)?,
            Blueprint::ParallelWeakAnd(wand) => wand.create_search(md)?,
            Blueprint::WeightedSet(ws) => ws.create_search(md, false)?,
            Blueprint::DotProduct(ws) => ws.create_search(md, true)?,
        };
        Ok(search)
    }
}

/// A blueprint whose postings have been fetched.
pub struct FetchedBlueprint(Blueprint);

impl FetchedBlueprint {
    pub fn blueprint(&self) -> &Blueprint {
        &self.0
    }

    pub fn estimate(&self) -> HitEstimate {
        self.0.estimate()
    }

    /// Instantiates the iterator tree bound to `md`.
    ///
    /// The returned iterator still needs
    /// [`init_range`](SearchIterator::init_range) before seeking.
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` if any handle in the tree was allocated by a
    /// layout other than the one `md` was created from.
    pub fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        self.0.create_search(md)
    }

    pub fn as_string(&self) -> String {
        self.0.as_string()
    }
}
