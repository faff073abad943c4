//! Matching configuration.

use tessera_common::{Result, verify_arg};

/// Suffix appended to a location field name to find the attribute holding its
/// z-curve encoded positions.
pub const ZCURVE_SUFFIX: &str = "_zcurve";

/// Settings that affect how a query is compiled into an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Suffix of the attribute field that location terms are searched in.
    pub zcurve_suffix: String,
    /// Strictness hint passed to the blueprint tree when postings are fetched.
    pub strict_postings: bool,
    /// Sort intersection children by ascending and union children by
    /// descending hit estimate during optimization.
    pub reorder_children: bool,
    /// Merge nested intersections and unions during optimization.
    pub flatten_intermediates: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            zcurve_suffix: ZCURVE_SUFFIX.to_string(),
            strict_postings: true,
            reorder_children: true,
            flatten_intermediates: true,
        }
    }
}

impl MatchingConfig {
    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(zcurve_suffix, !self.zcurve_suffix.is_empty());
        verify_arg!(zcurve_suffix, !self.zcurve_suffix.contains(':'));
        Ok(())
    }

    pub(crate) fn optimize_options(&self) -> tessera_queryeval::blueprint::OptimizeOptions {
        tessera_queryeval::blueprint::OptimizeOptions {
            flatten: self.flatten_intermediates,
            reorder: self.reorder_children,
        }
    }
}
