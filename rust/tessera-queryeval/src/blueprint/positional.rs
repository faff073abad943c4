use tessera_common::Result;

use crate::estimate::HitEstimate;
use crate::field_spec::FieldSpec;
use crate::match_data::{MatchData, MatchDataLayout};
use crate::search::SearchIterator;
use crate::search::positional::{PositionConstraint, PositionalSearch};

use super::Blueprint;

/// Proximity over child term blueprints, unordered (`Near`) or ordered
/// (`ONear`) depending on the enclosing [`Blueprint`] variant.
pub struct NearBlueprint {
    window: u32,
    children: Vec<Blueprint>,
}

impl NearBlueprint {
    pub fn new(window: u32, children: Vec<Blueprint>) -> NearBlueprint {
        NearBlueprint { window, children }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn children(&self) -> &[Blueprint] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Blueprint> {
        &mut self.children
    }

    pub fn estimate(&self) -> HitEstimate {
        HitEstimate::intersect(self.children.iter().map(Blueprint::estimate))
    }

    pub(super) fn create_search(
        &self,
        md: &MatchData,
        ordered: bool,
    ) -> Result<Box<dyn SearchIterator>> {
        let children = self
            .children
            .iter()
            .map(|c| c.create_search(md))
            .collect::<Result<Vec<_>>>()?;
        let child_handles = self.children.iter().map(Blueprint::handles).collect();
        let constraint = if ordered {
            PositionConstraint::ONear {
                window: self.window,
            }
        } else {
            PositionConstraint::Near {
                window: self.window,
            }
        };
        Ok(Box::new(PositionalSearch::new(
            constraint,
            children,
            child_handles,
            md.empty_like(),
        )))
    }
}

/// Exact phrase of child terms in one field.
///
/// The child terms are bound to a private match-data layout owned by the
/// phrase; only the phrase itself occupies a slot of the shared layout, at
/// `field.handle()`.
pub struct PhraseBlueprint {
    field: FieldSpec,
    child_layout: MatchDataLayout,
    children: Vec<Blueprint>,
}

impl PhraseBlueprint {
    /// # Arguments
    ///
    /// * `field` - The field searched, with the phrase's own handle.
    /// * `child_layout` - Layout that allocated the handles of `children`.
    /// * `children` - One blueprint per phrase word, in phrase order.
    pub fn new(
        field: FieldSpec,
        child_layout: MatchDataLayout,
        children: Vec<Blueprint>,
    ) -> PhraseBlueprint {
        PhraseBlueprint {
            field,
            child_layout,
            children,
        }
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

    pub fn estimate(&self) -> HitEstimate {
        HitEstimate::intersect(self.children.iter().map(Blueprint::estimate))
    }

    pub(super) fn create_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        md.check_handle(self.field.handle())?;
        let child_md = self.child_layout.create_match_data();
        let children = self
            .children
            .iter()
            .map(|c| c.create_search(&child_md))
            .collect::<Result<Vec<_>>>()?;
        let child_handles = self.children.iter().map(Blueprint::handles).collect();
        Ok(Box::new(PositionalSearch::phrase(
            children,
            child_handles,
            child_md,
            self.field.handle(),
        )))
    }
}
