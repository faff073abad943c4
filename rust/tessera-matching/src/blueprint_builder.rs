//! Turns a resolved and reserved query tree into a blueprint tree.
//!
//! Operators map one to one onto intermediate blueprints. A term is built once
//! per resolved field and the per-field plans are OR-ed. In each field:
//!
//! - attribute fields are looked up in the attribute source only,
//! - index fields are looked up in every index source; with a source selector
//!   the per-source plans are blended, otherwise they are used directly
//!   (one source) or OR-ed (several),
//! - sources estimating zero hits are left out, and a field left without
//!   sources yields an empty blueprint labelled `field:term`,
//! - phrases, weighted sets, dot products and wand terms bind their words to a
//!   private layout and occupy only their own slot of the shared one.
//!
//! The estimate of every term is written back to all of its fields as a
//! document frequency.

use std::sync::Arc;

use tessera_common::{Result, error::Error};
use tessera_queryeval::blueprint::{
    NearBlueprint, ParallelWeakAndBlueprint, PhraseBlueprint, SourceBlenderBlueprint, WeakAndBlueprint,
    WeightedSetBlueprint,
};
use tessera_queryeval::source_selector::SourceSelector;
use tessera_queryeval::{Blueprint, FieldSpec, MatchDataLayout, QueryTerm};

use crate::request_context::RequestContext;
use crate::search_context::{IndexSource, SearchContext};
use crate::tree::{Node, Term, TermFieldData, TermKind};

/// Weight of a weak-and child that is not a term.
const DEFAULT_CHILD_WEIGHT: u32 = 100;

/// Builds the blueprint of `node`, writing document frequencies into its terms.
///
/// # Errors
///
/// Returns `InvalidOperation` if a term has a resolved field without a
/// reserved handle, and any error a searchable reports while creating a leaf.
pub fn build(request: &RequestContext, node: &mut Node, context: &dyn SearchContext) -> Result<Blueprint> {
    BlueprintBuilder::new(request, context).build_node(node)
}

struct BlueprintBuilder<'a> {
    request: &'a RequestContext,
    context: &'a dyn SearchContext,
    sources: Vec<IndexSource<'a>>,
    selector: Option<Arc<dyn SourceSelector>>,
    doc_count: u32,
}

impl<'a> BlueprintBuilder<'a> {
    fn new(request: &'a RequestContext, context: &'a dyn SearchContext) -> Self {
        BlueprintBuilder {
            request,
            context,
            sources: context.index_sources(),
            selector: context.source_selector(),
            doc_count: context.docid_limit().saturating_sub(1),
        }
    }

    fn build_node(&self, node: &mut Node) -> Result<Blueprint> {
        let blueprint = match node {
            Node::And(children) => Blueprint::And(self.build_all(children)?),
            Node::Or(children) => Blueprint::Or(self.build_all(children)?),
            Node::AndNot(children) => Blueprint::AndNot(self.build_all(children)?),
            Node::Rank(children) => Blueprint::Rank(self.build_all(children)?),
            Node::Near(near) => {
                Blueprint::Near(NearBlueprint::new(near.window, self.build_all(&mut near.children)?))
            }
            Node::ONear(near) => {
                Blueprint::ONear(NearBlueprint::new(near.window, self.build_all(&mut near.children)?))
            }
            Node::WeakAnd(wand) => {
                let mut blueprint = WeakAndBlueprint::new(wand.target_hits);
                for child in wand.children.iter_mut() {
                    let weight = match child {
                        Node::Term(term) => u32::try_from(term.data().weight().percent()).unwrap_or(0),
                        _ => DEFAULT_CHILD_WEIGHT,
                    };
                    blueprint.add_child(self.build_node(child)?, weight);
                }
                Blueprint::WeakAnd(blueprint)
            }
            Node::Term(term) => self.build_term(term)?,
        };
        Ok(blueprint)
    }

    fn build_all(&self, children: &mut [Node]) -> Result<Vec<Blueprint>> {
        children.iter_mut().map(|c| self.build_node(c)).collect()
    }

    fn build_term(&self, term: &mut Term) -> Result<Blueprint> {
        if term.data().num_fields() == 0 {
            return Ok(Blueprint::empty_with_label(term.describe()));
        }
        let mut per_field = term
            .data()
            .fields()
            .iter()
            .map(|field| self.build_term_field(term, field))
            .collect::<Result<Vec<_>>>()?;

        let blueprint = if per_field.len() == 1 {
            per_field.pop().unwrap_or_else(Blueprint::empty)
        } else {
            Blueprint::Or(per_field)
        };
        let doc_freq = blueprint.estimate().doc_frequency(self.doc_count);
        for field in term.data_mut().fields_mut() {
            field.set_doc_freq(doc_freq);
        }
        log::trace!(
            "[{}] {}: {} hits estimated",
            self.request.label(),
            term.describe(),
            blueprint.estimate().est_hits()
        );
        Ok(blueprint)
    }

    fn build_term_field(&self, term: &Term, field: &TermFieldData) -> Result<Blueprint> {
        let handle = field.handle().ok_or_else(|| {
            Error::invalid_operation(format!(
                "build blueprint: no handle reserved for {} in field '{}'",
                term.describe(),
                field.field_name()
            ))
        })?;
        let spec = FieldSpec::new(field.field_name(), field.field_id(), handle);
        let attribute = field.attribute_field();

        let blueprint = match term.kind() {
            TermKind::Phrase(words) => {
                let (layout, children) = self.build_words(words, &spec, attribute)?;
                Blueprint::Phrase(PhraseBlueprint::new(spec, layout, children))
            }
            TermKind::WeightedSet(tokens) => {
                let (layout, children) = self.build_words(tokens, &spec, attribute)?;
                Blueprint::WeightedSet(weighted_set(spec, layout, tokens, children))
            }
            TermKind::DotProduct(tokens) => {
                let (layout, children) = self.build_words(tokens, &spec, attribute)?;
                Blueprint::DotProduct(weighted_set(spec, layout, tokens, children))
            }
            TermKind::Wand(wand) => {
                let (layout, children) = self.build_words(&wand.children, &spec, attribute)?;
                let mut blueprint = ParallelWeakAndBlueprint::new(
                    spec,
                    layout,
                    wand.target_hits,
                    wand.score_threshold,
                    wand.threshold_boost_factor,
                    self.context.docid_limit(),
                );
                for (token, child) in wand.children.iter().zip(children) {
                    blueprint.add_child(child, token.data().weight().percent());
                }
                Blueprint::ParallelWeakAnd(blueprint)
            }
            _ => self.lookup(term, &spec, attribute)?,
        };
        Ok(blueprint)
    }

    /// Builds the words of a term composite against a fresh private layout.
    fn build_words(
        &self,
        words: &[Term],
        spec: &FieldSpec,
        attribute: bool,
    ) -> Result<(MatchDataLayout, Vec<Blueprint>)> {
        let mut layout = MatchDataLayout::new();
        let mut children = Vec::with_capacity(words.len());
        for word in words {
            let handle = layout.alloc_term_field(spec.field_id());
            let word_spec = FieldSpec::new(spec.name(), spec.field_id(), handle);
            children.push(self.lookup(word, &word_spec, attribute)?);
        }
        Ok((layout, children))
    }

    /// Looks up a simple term in one field.
    fn lookup(&self, term: &Term, spec: &FieldSpec, attribute: bool) -> Result<Blueprint> {
        let label = format!("{}:{}", spec.name(), term.text().unwrap_or_default());
        let (Some(text), Some(match_kind)) = (term.text(), term.match_kind()) else {
            return Ok(Blueprint::empty_with_label(label));
        };
        let query_term = QueryTerm::new(&text, match_kind)
            .with_weight(term.data().weight().percent())
            .with_unique_id(term.data().unique_id());

        if attribute {
            let blueprint = self.context.attributes().create_blueprint(spec, &query_term)?;
            return Ok(if blueprint.is_empty() {
                Blueprint::empty_with_label(label)
            } else {
                blueprint
            });
        }

        let mut hits = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let blueprint = source.searchable.create_blueprint(spec, &query_term)?;
            if !blueprint.is_empty() {
                hits.push((source.source_id, blueprint));
            }
        }
        log::trace!(
            "[{}] {label}: {} of {} sources with hits",
            self.request.label(),
            hits.len(),
            self.sources.len()
        );
        let blueprint = match (&self.selector, hits.len()) {
            (_, 0) => Blueprint::empty_with_label(label),
            (Some(selector), _) => Blueprint::SourceBlender(SourceBlenderBlueprint::new(selector.clone(), hits)),
            (None, 1) => hits.pop().map_or_else(Blueprint::empty, |(_, bp)| bp),
            (None, _) => Blueprint::Or(hits.into_iter().map(|(_, bp)| bp).collect()),
        };
        Ok(blueprint)
    }
}

fn weighted_set(
    spec: FieldSpec,
    layout: MatchDataLayout,
    tokens: &[Term],
    children: Vec<Blueprint>,
) -> WeightedSetBlueprint {
    let mut blueprint = WeightedSetBlueprint::new(spec, layout);
    for (token, child) in tokens.iter().zip(children) {
        blueprint.add_child(child, token.data().weight().percent());
    }
    blueprint
}
