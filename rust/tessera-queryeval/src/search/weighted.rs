//! Weighted disjunctions: top-k heuristics (weak-and, parallel weak-and) and
//! the weighted-set term family.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::match_data::{MatchData, MatchPosition, TermFieldHandle};

use super::{DocId, SearchCursor, SearchIterator, composite_string, init_children, seek_any};

/// Sum of the weights of the children positioned on `doc_id`.
fn score_at(children: &[Box<dyn SearchIterator>], weights: &[i64], doc_id: DocId) -> i64 {
    children
        .iter()
        .zip(weights)
        .filter(|(child, _)| child.doc_id() == doc_id)
        .map(|(_, &w)| w)
        .sum()
}

/// Bounded min-heap of the best scores seen so far.
#[derive(Debug)]
struct ScoreHeap {
    capacity: usize,
    scores: BinaryHeap<Reverse<i64>>,
}

impl ScoreHeap {
    fn new(capacity: usize) -> ScoreHeap {
        ScoreHeap {
            capacity,
            scores: BinaryHeap::with_capacity(capacity.min(1024) + 1),
        }
    }

    fn is_full(&self) -> bool {
        self.scores.len() >= self.capacity
    }

    fn min(&self) -> Option<i64> {
        self.scores.peek().map(|s| s.0)
    }

    fn push(&mut self, score: i64) {
        self.scores.push(Reverse(score));
        while self.scores.len() > self.capacity {
            self.scores.pop();
        }
    }

    fn clear(&mut self) {
        self.scores.clear();
    }
}

/// Heap-bounded disjunction keeping roughly the `n` best-scoring documents.
///
/// A document's score is the sum of the weights of the children matching it.
/// A candidate is accepted while fewer than `n` scores are tracked, and
/// afterwards only when it beats the smallest tracked score.
pub struct WeakAndSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
    weights: Vec<i64>,
    n: u32,
    heap: ScoreHeap,
}

impl WeakAndSearch {
    pub fn new(children: Vec<Box<dyn SearchIterator>>, weights: &[u32], n: u32) -> WeakAndSearch {
        WeakAndSearch {
            cursor: SearchCursor::new(),
            children,
            weights: weights.iter().map(|&w| w as i64).collect(),
            n,
            heap: ScoreHeap::new(n as usize),
        }
    }

    fn accept(&mut self, score: i64) -> bool {
        let accepted = !self.heap.is_full() || self.heap.min().is_none_or(|min| score > min);
        if accepted {
            self.heap.push(score);
        }
        accepted
    }
}

impl SearchIterator for WeakAndSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
        self.heap.clear();
    }

    fn do_seek(&mut self, mut target: DocId) {
        loop {
            let next = seek_any(&mut self.children, target);
            if next >= self.cursor.end_id() {
                self.cursor.set_at_end();
                return;
            }
            let score = score_at(&self.children, &self.weights, next);
            if self.accept(score) {
                self.cursor.set_doc_id(next);
                return;
            }
            target = next + 1;
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        for child in self.children.iter_mut() {
            if child.doc_id() == doc_id {
                child.unpack(doc_id, md);
            }
        }
    }

    fn as_string(&self) -> String {
        composite_string("WeakAndSearch", &format!("n={}", self.n), &self.children)
    }
}

/// Parameters of a parallel weak-and evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WandParams {
    pub scores_to_track: u32,
    pub score_threshold: i64,
    pub threshold_boost_factor: f64,
}

/// Weak-and over the children of a single wand term, scored with a threshold.
///
/// Until `scores_to_track` scores are tracked the threshold is
/// `score_threshold`; afterwards it is the larger of `score_threshold` and the
/// smallest tracked score times `threshold_boost_factor`. A candidate is
/// accepted when its score exceeds the threshold, and the score is reported as
/// the raw score of the term's handle on unpack.
pub struct ParallelWeakAndSearch {
    cursor: SearchCursor,
    children: Vec<Box<dyn SearchIterator>>,
    weights: Vec<i64>,
    params: WandParams,
    output: TermFieldHandle,
    heap: ScoreHeap,
    current_score: i64,
}

impl ParallelWeakAndSearch {
    pub fn new(
        children: Vec<Box<dyn SearchIterator>>,
        weights: &[i32],
        params: WandParams,
        output: TermFieldHandle,
    ) -> ParallelWeakAndSearch {
        ParallelWeakAndSearch {
            cursor: SearchCursor::new(),
            children,
            weights: weights.iter().map(|&w| w as i64).collect(),
            params,
            output,
            heap: ScoreHeap::new(params.scores_to_track as usize),
            current_score: 0,
        }
    }

    fn threshold(&self) -> f64 {
        let base = self.params.score_threshold as f64;
        match self.heap.min() {
            Some(min) if self.heap.is_full() => {
                base.max(min as f64 * self.params.threshold_boost_factor)
            }
            _ => base,
        }
    }
}

impl SearchIterator for ParallelWeakAndSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
        self.heap.clear();
    }

    fn do_seek(&mut self, mut target: DocId) {
        loop {
            let next = seek_any(&mut self.children, target);
            if next >= self.cursor.end_id() {
                self.cursor.set_at_end();
                return;
            }
            let score = score_at(&self.children, &self.weights, next);
            if score as f64 > self.threshold() {
                self.heap.push(score);
                self.current_score = score;
                self.cursor.set_doc_id(next);
                return;
            }
            target = next + 1;
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        if let Some(tfmd) = md.resolve_mut(self.output) {
            tfmd.reset(doc_id);
            tfmd.set_raw_score(self.current_score as f64);
        }
    }

    fn as_string(&self) -> String {
        let params = format!(
            "n={}, threshold={}, boost={}",
            self.params.scores_to_track,
            self.params.score_threshold,
            self.params.threshold_boost_factor
        );
        composite_string("ParallelWeakAndSearch", &params, &self.children)
    }
}

/// How a weighted-set term reports a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightedSetKind {
    /// One occurrence per matching child, carrying the child weight.
    WeightedSet,
    /// The summed weight of the matching children as raw score.
    DotProduct,
}

/// Disjunction over the tokens of a weighted-set or dot-product term.
pub struct WeightedSetSearch {
    cursor: SearchCursor,
    kind: WeightedSetKind,
    children: Vec<Box<dyn SearchIterator>>,
    weights: Vec<i32>,
    output: TermFieldHandle,
}

impl WeightedSetSearch {
    pub fn new(
        kind: WeightedSetKind,
        children: Vec<Box<dyn SearchIterator>>,
        weights: Vec<i32>,
        output: TermFieldHandle,
    ) -> WeightedSetSearch {
        WeightedSetSearch {
            cursor: SearchCursor::new(),
            kind,
            children,
            weights,
            output,
        }
    }
}

impl SearchIterator for WeightedSetSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, target: DocId) {
        let next = seek_any(&mut self.children, target);
        self.cursor.set_doc_id(next);
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        let Some(tfmd) = md.resolve_mut(self.output) else {
            return;
        };
        tfmd.reset(doc_id);
        let matching = self
            .children
            .iter()
            .zip(&self.weights)
            .enumerate()
            .filter(|(_, (child, _))| child.doc_id() == doc_id);
        match self.kind {
            WeightedSetKind::WeightedSet => {
                for (i, (_, &weight)) in matching {
                    tfmd.append_position(
                        MatchPosition::new(0)
                            .with_element(i as u32, 1)
                            .with_weight(weight),
                    );
                }
            }
            WeightedSetKind::DotProduct => {
                let sum: i64 = matching.map(|(_, (_, &w))| w as i64).sum();
                tfmd.set_raw_score(sum as f64);
            }
        }
    }

    fn as_string(&self) -> String {
        let name = match self.kind {
            WeightedSetKind::WeightedSet => "WeightedSetSearch",
            WeightedSetKind::DotProduct => "DotProductSearch",
        };
        composite_string(name, "", &self.children)
    }
}
