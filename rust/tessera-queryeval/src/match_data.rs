//! Match data: per-query scratch buffers that search iterators fill in on `unpack`
//! and ranking code reads afterwards.
//!
//! A [`MatchDataLayout`] is an arena-style allocator of [`TermFieldHandle`]s. Every
//! layout carries a process-unique [`LayoutId`], and every handle it hands out is
//! tagged with that id. A [`MatchData`] created from the layout carries the same id,
//! so a handle can only ever address slots of the buffer it was allocated for:
//! lookups with a handle from a different layout return `None` instead of touching
//! an unrelated slot.
//!
//! Handles are allocated in strictly increasing slot order and are never reused
//! within the lifetime of a layout.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_common::{Result, error::Error};

use crate::index_env::FieldId;
use crate::search::DocId;

/// Process-unique identity of a [`MatchDataLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutId(u64);

impl LayoutId {
    fn next() -> LayoutId {
        static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(1);
        LayoutId(NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Typed index of one term-field slot inside a [`MatchData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermFieldHandle {
    layout: LayoutId,
    slot: u32,
}

impl TermFieldHandle {
    /// The layout that allocated this handle.
    pub fn layout(&self) -> LayoutId {
        self.layout
    }

    /// Slot index within the owning layout.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for TermFieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.layout, self.slot)
    }
}

/// Builder of term-field handles for one query evaluation.
#[derive(Debug)]
pub struct MatchDataLayout {
    id: LayoutId,
    field_ids: Vec<FieldId>,
}

impl MatchDataLayout {
    pub fn new() -> MatchDataLayout {
        MatchDataLayout {
            id: LayoutId::next(),
            field_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> LayoutId {
        self.id
    }

    /// Reserves a new slot for a term matched against the field `field_id`.
    pub fn alloc_term_field(&mut self, field_id: FieldId) -> TermFieldHandle {
        let slot = self.field_ids.len() as u32;
        self.field_ids.push(field_id);
        TermFieldHandle {
            layout: self.id,
            slot,
        }
    }

    pub fn num_term_fields(&self) -> usize {
        self.field_ids.len()
    }

    /// Returns true if `handle` was allocated by this layout.
    pub fn owns(&self, handle: TermFieldHandle) -> bool {
        handle.layout == self.id && handle.slot() < self.field_ids.len()
    }

    /// Freezes the current allocation state into a match data buffer with exactly
    /// [`num_term_fields`](Self::num_term_fields) slots.
    pub fn create_match_data(&self) -> MatchData {
        MatchData {
            layout: self.id,
            term_fields: self
                .field_ids
                .iter()
                .map(|&field_id| TermFieldMatchData::new(field_id))
                .collect(),
        }
    }
}

impl Default for MatchDataLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// One occurrence of a term within a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPosition {
    pub element_id: u32,
    pub position: u32,
    pub element_len: u32,
    pub element_weight: i32,
}

impl MatchPosition {
    /// Occurrence at `position` in element 0 of unknown length.
    pub fn new(position: u32) -> MatchPosition {
        MatchPosition {
            element_id: 0,
            position,
            element_len: u32::MAX,
            element_weight: 1,
        }
    }

    pub fn with_element(mut self, element_id: u32, element_len: u32) -> MatchPosition {
        self.element_id = element_id;
        self.element_len = element_len;
        self
    }

    pub fn with_weight(mut self, element_weight: i32) -> MatchPosition {
        self.element_weight = element_weight;
        self
    }

    /// Sort key used by positional operators: element first, then position.
    #[inline]
    pub fn key(&self) -> (u32, u32) {
        (self.element_id, self.position)
    }
}

/// Match details of a single term in a single field for the current document.
#[derive(Debug, Clone)]
pub struct TermFieldMatchData {
    field_id: FieldId,
    doc_id: DocId,
    positions: Vec<MatchPosition>,
    raw_score: Option<f64>,
}

impl TermFieldMatchData {
    pub fn new(field_id: FieldId) -> TermFieldMatchData {
        TermFieldMatchData {
            field_id,
            doc_id: 0,
            positions: Vec::new(),
            raw_score: None,
        }
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    /// The document these details were last unpacked for (0 if never).
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    pub fn positions(&self) -> &[MatchPosition] {
        &self.positions
    }

    pub fn raw_score(&self) -> Option<f64> {
        self.raw_score
    }

    /// Starts recording details for `doc_id`, discarding previous content.
    pub fn reset(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
        self.positions.clear();
        self.raw_score = None;
    }

    pub fn append_position(&mut self, position: MatchPosition) {
        self.positions.push(position);
    }

    pub fn set_raw_score(&mut self, score: f64) {
        self.raw_score = Some(score);
    }
}

/// Fixed-size per-query buffer addressable by [`TermFieldHandle`].
#[derive(Debug, Clone)]
pub struct MatchData {
    layout: LayoutId,
    term_fields: Vec<TermFieldMatchData>,
}

impl MatchData {
    pub fn layout_id(&self) -> LayoutId {
        self.layout
    }

    pub fn num_term_fields(&self) -> usize {
        self.term_fields.len()
    }

    /// Returns true if `handle` addresses a slot of this buffer.
    pub fn owns(&self, handle: TermFieldHandle) -> bool {
        handle.layout == self.layout && handle.slot() < self.term_fields.len()
    }

    /// Fails with `ForeignHandle` unless `handle` addresses a slot of this buffer.
    pub fn check_handle(&self, handle: TermFieldHandle) -> Result<()> {
        if self.owns(handle) {
            Ok(())
        } else {
            Err(Error::foreign_handle(handle.to_string()))
        }
    }

    pub fn resolve(&self, handle: TermFieldHandle) -> Option<&TermFieldMatchData> {
        if handle.layout == self.layout {
            self.term_fields.get(handle.slot())
        } else {
            None
        }
    }

    pub fn resolve_mut(&mut self, handle: TermFieldHandle) -> Option<&mut TermFieldMatchData> {
        if handle.layout == self.layout {
            self.term_fields.get_mut(handle.slot())
        } else {
            None
        }
    }

    /// A fresh buffer for the same layout, with every slot cleared.
    ///
    /// Positional iterators use it as private scratch space so that checking a
    /// candidate document never clobbers what has been unpacked for ranking.
    pub fn empty_like(&self) -> MatchData {
        MatchData {
            layout: self.layout,
            term_fields: self
                .term_fields
                .iter()
                .map(|tfmd| TermFieldMatchData::new(tfmd.field_id))
                .collect(),
        }
    }

    /// Iterates over all slots in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &TermFieldMatchData> {
        self.term_fields.iter()
    }
}
