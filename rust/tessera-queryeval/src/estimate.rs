//! Hit estimates propagated bottom-up through a blueprint tree.

/// Estimated number of matching documents for a blueprint.
///
/// An estimate is empty exactly when it expects zero hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEstimate {
    est_hits: u32,
    empty: bool,
}

impl HitEstimate {
    pub fn new(est_hits: u32) -> HitEstimate {
        HitEstimate {
            est_hits,
            empty: est_hits == 0,
        }
    }

    pub fn empty() -> HitEstimate {
        HitEstimate::new(0)
    }

    pub fn est_hits(&self) -> u32 {
        self.est_hits
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Intersection estimate: the smallest child bounds the result.
    pub fn intersect(estimates: impl IntoIterator<Item = HitEstimate>) -> HitEstimate {
        estimates
            .into_iter()
            .map(|e| e.est_hits)
            .min()
            .map_or_else(HitEstimate::empty, HitEstimate::new)
    }

    /// Union estimate: the largest child is a lower bound for the result and the
    /// one used for cost decisions.
    pub fn union(estimates: impl IntoIterator<Item = HitEstimate>) -> HitEstimate {
        estimates
            .into_iter()
            .map(|e| e.est_hits)
            .max()
            .map_or_else(HitEstimate::empty, HitEstimate::new)
    }

    /// Document frequency relative to `doc_count` documents, clamped to `[0, 1]`.
    ///
    /// A zero `doc_count` yields 0.
    pub fn doc_frequency(&self, doc_count: u32) -> f64 {
        if doc_count == 0 {
            return 0.0;
        }
        (self.est_hits as f64 / doc_count as f64).min(1.0)
    }
}

impl Default for HitEstimate {
    fn default() -> Self {
        HitEstimate::empty()
    }
}
