//! Blueprint tree rewriting.
//!
//! The rewrite never changes the set of matched documents. It prunes branches
//! whose estimate is empty, flattens nested intersections and unions, and
//! reorders commutative children so that intersections are driven by their
//! cheapest child.

use std::cmp::Reverse;
use std::mem;

use super::{Blueprint, SourceBlenderBlueprint};

/// Switches for the individual rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Merge AND children into an AND parent, and OR children into an OR parent.
    pub flatten: bool,
    /// Sort AND children by ascending and OR children by descending estimate.
    pub reorder: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            flatten: true,
            reorder: true,
        }
    }
}

impl Blueprint {
    /// Rewrites the tree bottom-up. See the module documentation.
    pub fn optimize(self, options: &OptimizeOptions) -> Blueprint {
        match self {
            Blueprint::Empty(_) | Blueprint::Leaf(_) => self,
            Blueprint::And(children) => optimize_and(children, options),
            Blueprint::Or(children) => optimize_or(children, options),
            Blueprint::AndNot(children) => optimize_and_not(children, options),
            Blueprint::Rank(children) => {
                let children = optimize_all(children, options);
                if children.first().is_none_or(Blueprint::is_empty) {
                    into_empty(children)
                } else if children.len() == 1 {
                    single(children)
                } else {
                    Blueprint::Rank(children)
                }
            }
            Blueprint::SourceBlender(blender) => {
                let (selector, children) = blender.into_parts();
                let children = children
                    .into_iter()
                    .map(|(source, child)| (source, child.optimize(options)))
                    .filter(|(_, child)| !child.is_empty())
                    .collect::<Vec<_>>();
                if children.is_empty() {
                    log::trace!("optimize: source blender without hits pruned");
                    Blueprint::empty()
                } else {
                    Blueprint::SourceBlender(SourceBlenderBlueprint::new(selector, children))
                }
            }
            Blueprint::Near(mut near) => {
                optimize_in_place(near.children_mut(), options);
                if near.children().iter().any(Blueprint::is_empty) {
                    Blueprint::empty()
                } else {
                    Blueprint::Near(near)
                }
            }
            Blueprint::ONear(mut near) => {
                optimize_in_place(near.children_mut(), options);
                if near.children().iter().any(Blueprint::is_empty) {
                    Blueprint::empty()
                } else {
                    Blueprint::ONear(near)
                }
            }
            Blueprint::Phrase(mut phrase) => {
                optimize_in_place(phrase.children_mut(), options);
                if phrase.children().iter().any(Blueprint::is_empty) {
                    Blueprint::empty()
                } else {
                    Blueprint::Phrase(phrase)
                }
            }
            Blueprint::WeakAnd(mut wand) => {
                optimize_in_place(wand.children_mut(), options);
                wand.retain_non_empty();
                if wand.child_count() == 0 {
                    Blueprint::empty()
                } else {
                    Blueprint::WeakAnd(wand)
                }
            }
            Blueprint::ParallelWeakAnd(mut wand) => {
                optimize_in_place(wand.children_mut(), options);
                wand.retain_non_empty();
                if wand.children().is_empty() {
                    Blueprint::empty()
                } else {
                    Blueprint::ParallelWeakAnd(wand)
                }
            }
            Blueprint::WeightedSet(mut ws) => {
                optimize_in_place(ws.children_mut(), options);
                ws.retain_non_empty();
                if ws.children().is_empty() {
                    Blueprint::empty()
                } else {
                    Blueprint::WeightedSet(ws)
                }
            }
            Blueprint::DotProduct(mut ws) => {
                optimize_in_place(ws.children_mut(), options);
                ws.retain_non_empty();
                if ws.children().is_empty() {
                    Blueprint::empty()
                } else {
                    Blueprint::DotProduct(ws)
                }
            }
        }
    }
}

fn optimize_all(children: Vec<Blueprint>, options: &OptimizeOptions) -> Vec<Blueprint> {
    children.into_iter().map(|c| c.optimize(options)).collect()
}

fn optimize_in_place(children: &mut Vec<Blueprint>, options: &OptimizeOptions) {
    *children = optimize_all(mem::take(children), options);
}

/// The first empty child, keeping its label when it has one.
fn into_empty(children: Vec<Blueprint>) -> Blueprint {
    children
        .into_iter()
        .find(Blueprint::is_empty)
        .map(|child| match child {
            Blueprint::Empty(label) => Blueprint::Empty(label),
            _ => Blueprint::empty(),
        })
        .unwrap_or_else(Blueprint::empty)
}

fn single(mut children: Vec<Blueprint>) -> Blueprint {
    children.pop().unwrap_or_else(Blueprint::empty)
}

fn flatten(
    children: Vec<Blueprint>,
    options: &OptimizeOptions,
    unwrap: fn(Blueprint) -> Result<Vec<Blueprint>, Blueprint>,
) -> Vec<Blueprint> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        let child = child.optimize(options);
        if !options.flatten {
            flat.push(child);
            continue;
        }
        match unwrap(child) {
            Ok(grandchildren) => flat.extend(grandchildren),
            Err(child) => flat.push(child),
        }
    }
    flat
}

fn optimize_and(children: Vec<Blueprint>, options: &OptimizeOptions) -> Blueprint {
    let mut children = flatten(children, options, |bp| match bp {
        Blueprint::And(grandchildren) => Ok(grandchildren),
        other => Err(other),
    });
    if children.is_empty() {
        return Blueprint::empty();
    }
    if children.iter().any(Blueprint::is_empty) {
        log::trace!("optimize: intersection with an empty child pruned");
        return into_empty(children);
    }
    if children.len() == 1 {
        return single(children);
    }
    if options.reorder {
        children.sort_by_key(|c| c.estimate().est_hits());
    }
    Blueprint::And(children)
}

fn optimize_or(children: Vec<Blueprint>, options: &OptimizeOptions) -> Blueprint {
    let children = flatten(children, options, |bp| match bp {
        Blueprint::Or(grandchildren) => Ok(grandchildren),
        other => Err(other),
    });
    let mut children = children
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>();
    match children.len() {
        0 => Blueprint::empty(),
        1 => single(children),
        _ => {
            if options.reorder {
                children.sort_by_key(|c| Reverse(c.estimate().est_hits()));
            }
            Blueprint::Or(children)
        }
    }
}

fn optimize_and_not(children: Vec<Blueprint>, options: &OptimizeOptions) -> Blueprint {
    let mut children = optimize_all(children, options).into_iter();
    let Some(positive) = children.next() else {
        return Blueprint::empty();
    };
    if positive.is_empty() {
        return into_empty(vec![positive]);
    }
    let mut kept = vec![positive];
    kept.extend(children.filter(|c| !c.is_empty()));
    if kept.len() == 1 {
        single(kept)
    } else {
        Blueprint::AndNot(kept)
    }
}
