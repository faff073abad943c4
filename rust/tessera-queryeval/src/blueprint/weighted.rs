use tessera_common::Result;

use crate::estimate::HitEstimate;
use crate::field_spec::FieldSpec;
use crate::match_data::{MatchData, MatchDataLayout};
use crate::search::SearchIterator;
use crate::search::weighted::{
    ParallelWeakAndSearch, WandParams, WeakAndSearch, WeightedSetKind, WeightedSetSearch,
};

use super::Blueprint;

fn child_searches(children: &[Blueprint], md: &MatchData) -> Result<Vec<Box<dyn SearchIterator>>> {
    children.iter().map(|c| c.create_search(md)).collect()
}

/// Drops children estimated to match nothing, together with their weights.
fn retain_non_empty<W>(children: &mut Vec<Blueprint>, weights: &mut Vec<W>) {
    let (kept_children, kept_weights): (Vec<Blueprint>, Vec<W>) = std::mem::take(children)
        .into_iter()
        .zip(std::mem::take(weights))
        .filter(|(child, _)| !child.is_empty())
        .unzip();
    *children = kept_children;
    *weights = kept_weights;
}

/// Top-`n` weak-and over arbitrary child blueprints.
pub struct WeakAndBlueprint {
    n: u32,
    weights: Vec<u32>,
    children: Vec<Blueprint>,
}

impl WeakAndBlueprint {
    pub fn new(n: u32) -> WeakAndBlueprint {
        WeakAndBlueprint {
            n,
            weights: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: Blueprint, weight: u32) -> &mut Self {
        self.children.push(child);
        self.weights.push(weight);
        self
    }

    /// Target number of hits.
    pub fn n(&self) -> u32 {
        self.n
    }

    /// Child weights, in child order.
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, idx: usize) -> &Blueprint {
        &self.children[idx]
    }

    pub fn children(&self) -> &[Blueprint] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Blueprint> {
        &mut self.children
    }

    pub(crate) fn retain_non_empty(&mut self) {
        retain_non_empty(&mut self.children, &mut self.weights);
    }

    /// The union of the children, bounded by `n`.
    pub fn estimate(&self) -> HitEstimate {
        let union = HitEstimate::union(self.children.iter().map(Blueprint::estimate));
        HitEstimate::new(union.est_hits().min(self.n))
    }

    pub(super) fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        let children = child_searches(&self.children, md)?;
        Ok(Box::new(WeakAndSearch::new(children, &self.weights, self.n)))
    }
}

/// Parallel weak-and of one wand term in one field.
///
/// The wand tokens are bound to a private layout; the term's own handle in the
/// shared layout receives the document score.
pub struct ParallelWeakAndBlueprint {
    field: FieldSpec,
    child_layout: MatchDataLayout,
    children: Vec<Blueprint>,
    weights: Vec<i32>,
    scores_to_track: u32,
    score_threshold: i64,
    threshold_boost_factor: f64,
    docid_limit: u32,
}

impl ParallelWeakAndBlueprint {
    /// # Arguments
    ///
    /// * `field` - The field searched, with the term's own handle.
    /// * `child_layout` - Layout that allocated the handles of the children
    ///   later added through [`add_child`](Self::add_child).
    /// * `scores_to_track` - Number of top scores kept in the heap.
    /// * `score_threshold` - Initial score a document must exceed.
    /// * `threshold_boost_factor` - Factor applied to the smallest tracked score
    ///   once the heap is full.
    /// * `docid_limit` - Upper bound of the document id space.
    pub fn new(
        field: FieldSpec,
        child_layout: MatchDataLayout,
        scores_to_track: u32,
        score_threshold: i64,
        threshold_boost_factor: f64,
        docid_limit: u32,
    ) -> ParallelWeakAndBlueprint {
        ParallelWeakAndBlueprint {
            field,
            child_layout,
            children: Vec::new(),
            weights: Vec::new(),
            scores_to_track,
            score_threshold,
            threshold_boost_factor,
            docid_limit,
        }
    }

    pub fn add_child(&mut self, child: Blueprint, weight: i32) -> &mut Self {
        self.children.push(child);
        self.weights.push(weight);
        self
    }

    pub fn field(&self) -> &FieldSpec {
        &self.field
    }

    pub fn children(&self) -> &[Blueprint] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Blueprint> {
        &mut self.children
    }

    pub(crate) fn retain_non_empty(&mut self) {
        retain_non_empty(&mut self.children, &mut self.weights);
    }

    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    pub fn scores_to_track(&self) -> u32 {
        self.scores_to_track
    }

    pub fn score_threshold(&self) -> i64 {
        self.score_threshold
    }

    pub fn threshold_boost_factor(&self) -> f64 {
        self.threshold_boost_factor
    }

    pub fn docid_limit(&self) -> u32 {
        self.docid_limit
    }

    pub fn estimate(&self) -> HitEstimate {
        HitEstimate::union(self.children.iter().map(Blueprint::estimate))
    }

    pub(super) fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        md.check_handle(self.field.handle())?;
        let child_md = self.child_layout.create_match_data();
        let children = child_searches(&self.children, &child_md)?;
        let params = WandParams {
            scores_to_track: self.scores_to_track,
            score_threshold: self.score_threshold,
            threshold_boost_factor: self.threshold_boost_factor,
        };
        Ok(Box::new(ParallelWeakAndSearch::new(
            children,
            &self.weights,
            params,
            self.field.handle(),
        )))
    }
}

/// Weighted-set or dot-product term in one field.
pub struct WeightedSetBlueprint {
    field: FieldSpec,
    child_layout: MatchDataLayout,
    children: Vec<Blueprint>,
    weights: Vec<i32>,
}

impl WeightedSetBlueprint {
    pub fn new(field: FieldSpec, child_layout: MatchDataLayout) -> WeightedSetBlueprint {
        WeightedSetBlueprint {
            field,
            child_layout,
            children: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: Blueprint, weight: i32) -> &mut Self {
        self.children.push(child);
        self.weights.push(weight);
        self
    }

    pub fn field(&self) -> &FieldSpec {
        &self.field
    }

    pub fn children(&self) -> &[Blueprint] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Blueprint> {
        &mut self.children
    }

    pub(crate) fn retain_non_empty(&mut self) {
        retain_non_empty(&mut self.children, &mut self.weights);
    }

    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    pub fn estimate(&self) -> HitEstimate {
        HitEstimate::union(self.children.iter().map(Blueprint::estimate))
    }

    pub(super) fn create_search(
        &self,
        md: &MatchData,
        dot_product: bool,
    ) -> Result<Box<dyn SearchIterator>> {
        md.check_handle(self.field.handle())?;
        let child_md = self.child_layout.create_match_data();
        let children = child_searches(&self.children, &child_md)?;
        let kind = if dot_product {
            WeightedSetKind::DotProduct
        } else {
            WeightedSetKind::WeightedSet
        };
        Ok(Box::new(WeightedSetSearch::new(
            kind,
            children,
            self.weights.clone(),
            self.field.handle(),
        )))
    }
}
