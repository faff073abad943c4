//! Iterators that combine document-level intersection with a constraint on the
//! positions of the children inside the document.
//!
//! Candidates are found by leapfrogging the children like an AND. Each candidate
//! is then unpacked into a private scratch buffer and the children's position
//! lists are checked; a candidate that fails the check is skipped and the
//! search continues from the next document.
//!
//! Positions are only compared within one field. A child searching several
//! fields contributes one list per field, and the constraint must hold for
//! the lists of a single field.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::index_env::FieldId;
use crate::match_data::{MatchData, MatchPosition, TermFieldHandle};

use super::{DocId, SearchCursor, SearchIterator, composite_string, init_children, seek_all};

/// The positional requirement applied to candidate documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionConstraint {
    /// One occurrence per child, all in the same element, spanning at most
    /// `window` positions.
    Near { window: u32 },
    /// As `Near`, with occurrences strictly increasing in child order.
    ONear { window: u32 },
    /// Child `i` occurs at `p + i` for some start `p`, all in the same element.
    Phrase,
}

pub struct PositionalSearch {
    cursor: SearchCursor,
    constraint: PositionConstraint,
    children: Vec<Box<dyn SearchIterator>>,
    child_handles: Vec<Vec<TermFieldHandle>>,
    scratch: MatchData,
    output: Option<TermFieldHandle>,
    starts: Vec<MatchPosition>,
}

impl PositionalSearch {
    /// Near/ONear over children that unpack into the shared match data.
    ///
    /// `scratch` must address the same layout as the match data later passed
    /// to `unpack` (see [`MatchData::empty_like`]).
    pub fn new(
        constraint: PositionConstraint,
        children: Vec<Box<dyn SearchIterator>>,
        child_handles: Vec<Vec<TermFieldHandle>>,
        scratch: MatchData,
    ) -> PositionalSearch {
        PositionalSearch {
            cursor: SearchCursor::new(),
            constraint,
            children,
            child_handles,
            scratch,
            output: None,
            starts: Vec::new(),
        }
    }

    /// Phrase over children bound to a private layout; `scratch` is the match
    /// data of that layout, and the phrase occurrences are reported through
    /// `output` in the shared match data.
    pub fn phrase(
        children: Vec<Box<dyn SearchIterator>>,
        child_handles: Vec<Vec<TermFieldHandle>>,
        scratch: MatchData,
        output: TermFieldHandle,
    ) -> PositionalSearch {
        PositionalSearch {
            output: Some(output),
            ..PositionalSearch::new(PositionConstraint::Phrase, children, child_handles, scratch)
        }
    }

    /// Occurrences of one child in `doc_id`, merged per field.
    fn positions_by_field(&self, child: usize, doc_id: DocId) -> BTreeMap<FieldId, Vec<MatchPosition>> {
        self.child_handles[child]
            .iter()
            .filter_map(|&handle| self.scratch.resolve(handle))
            .filter(|tfmd| tfmd.doc_id() == doc_id && !tfmd.positions().is_empty())
            .into_group_map_by(|tfmd| tfmd.field_id())
            .into_iter()
            .map(|(field_id, tfmds)| {
                let mut positions: Vec<MatchPosition> = tfmds
                    .into_iter()
                    .map(|tfmd| tfmd.positions().iter().copied())
                    .kmerge_by(|a, b| a.key() < b.key())
                    .collect();
                positions.dedup_by_key(|p| p.key());
                (field_id, positions)
            })
            .collect()
    }

    fn check(&mut self, doc_id: DocId) -> bool {
        for child in self.children.iter_mut() {
            child.unpack(doc_id, &mut self.scratch);
        }
        let by_field = (0..self.children.len())
            .map(|i| self.positions_by_field(i, doc_id))
            .collect::<Vec<_>>();
        let Some(first) = by_field.first() else {
            return false;
        };

        self.starts.clear();
        let mut matched = false;
        for field_id in first.keys() {
            let Some(lists) = by_field
                .iter()
                .map(|child| child.get(field_id).map(Vec::as_slice))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            match self.constraint {
                PositionConstraint::Near { window } => matched = near_matches(&lists, window),
                PositionConstraint::ONear { window } => matched = onear_matches(&lists, window),
                PositionConstraint::Phrase => {
                    self.starts.extend(phrase_starts(&lists));
                    matched = !self.starts.is_empty();
                    continue;
                }
            }
            if matched {
                break;
            }
        }
        matched
    }
}

impl SearchIterator for PositionalSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        init_children(&mut self.children, begin, end);
    }

    fn do_seek(&mut self, mut target: DocId) {
        loop {
            let Some(candidate) = seek_all(&mut self.children, target, self.cursor.end_id())
            else {
                self.cursor.set_at_end();
                return;
            };
            if self.check(candidate) {
                self.cursor.set_doc_id(candidate);
                return;
            }
            target = candidate + 1;
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        match self.output {
            Some(handle) => {
                if let Some(tfmd) = md.resolve_mut(handle) {
                    tfmd.reset(doc_id);
                    for &start in &self.starts {
                        tfmd.append_position(start);
                    }
                }
            }
            None => {
                for child in self.children.iter_mut() {
                    child.unpack(doc_id, md);
                }
            }
        }
    }

    fn as_string(&self) -> String {
        match self.constraint {
            PositionConstraint::Near { window } => {
                composite_string("NearSearch", &format!("window={window}"), &self.children)
            }
            PositionConstraint::ONear { window } => {
                composite_string("ONearSearch", &format!("window={window}"), &self.children)
            }
            PositionConstraint::Phrase => composite_string("PhraseSearch", "", &self.children),
        }
    }
}

/// Sliding window over the merged occurrences of all lists, looking for a span
/// of at most `window` positions inside one element that covers every list.
fn near_matches<L: AsRef<[MatchPosition]>>(lists: &[L], window: u32) -> bool {
    if lists.is_empty() || lists.iter().any(|l| l.as_ref().is_empty()) {
        return false;
    }
    let entries = lists
        .iter()
        .enumerate()
        .map(|(child, list)| list.as_ref().iter().map(move |p| (p.key(), child)))
        .kmerge_by(|a, b| a.0 < b.0)
        .collect::<Vec<_>>();

    let mut counts = vec![0usize; lists.len()];
    let mut covered = 0;
    let mut lo = 0;
    for hi in 0..entries.len() {
        let ((element, position), child) = entries[hi];
        while lo < hi {
            let ((lo_element, lo_position), lo_child) = entries[lo];
            if lo_element == element && position - lo_position <= window {
                break;
            }
            counts[lo_child] -= 1;
            if counts[lo_child] == 0 {
                covered -= 1;
            }
            lo += 1;
        }
        if counts[child] == 0 {
            covered += 1;
        }
        counts[child] += 1;
        if covered == lists.len() {
            return true;
        }
    }
    false
}

/// For every occurrence of the first list, greedily picks the earliest
/// following occurrence of each next list in the same element.
fn onear_matches<L: AsRef<[MatchPosition]>>(lists: &[L], window: u32) -> bool {
    let Some((first, rest)) = lists.split_first() else {
        return false;
    };
    first.as_ref().iter().any(|start| {
        let (element, begin) = start.key();
        let mut last = begin;
        rest.iter().all(|list| {
            let list = list.as_ref();
            let idx = list.partition_point(|p| p.key() <= (element, last));
            match list.get(idx) {
                Some(p) if p.element_id == element && p.position - begin <= window => {
                    last = p.position;
                    true
                }
                _ => false,
            }
        })
    })
}

/// Occurrences of the first list that start a complete phrase.
fn phrase_starts<L: AsRef<[MatchPosition]>>(lists: &[L]) -> Vec<MatchPosition> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    first
        .as_ref()
        .iter()
        .filter(|start| {
            let (element, begin) = start.key();
            rest.iter().enumerate().all(|(i, list)| {
                let wanted = (element, begin + i as u32 + 1);
                list.as_ref().binary_search_by(|p| p.key().cmp(&wanted)).is_ok()
            })
        })
        .copied()
        .collect()
}
