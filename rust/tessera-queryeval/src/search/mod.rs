//! Pull-based search iterators.
//!
//! A search iterator enumerates matching documents in increasing document id
//! order. Its life cycle is `before first -> positioned(doc) -> at end`:
//!
//! - [`SearchIterator::init_range`] (or `init_full_range`) establishes the half-open
//!   document range `[begin, end)` and places the iterator before `begin`.
//! - [`SearchIterator::seek`] moves forward to the first hit at or after the target
//!   and reports whether the target itself is a hit. Iterators never move backwards;
//!   seeking to a document before the current one just reports whether the current
//!   position equals the target.
//! - [`SearchIterator::unpack`] may only be called while positioned on a hit. It
//!   writes term match details into the match data slots reserved for the
//!   iterator's terms.

use crate::match_data::MatchData;

pub mod blender;
pub mod intermediate;
pub mod positional;
pub mod weighted;

pub type DocId = u32;

/// First valid document id. Document id 0 is reserved.
pub const BEGIN_DOC_ID: DocId = 1;

/// Sentinel document id of an exhausted iterator.
pub const END_DOC_ID: DocId = DocId::MAX;

pub trait SearchIterator: Send {
    /// Current position. 0 before the first seek, [`END_DOC_ID`] when exhausted.
    fn doc_id(&self) -> DocId;

    /// Restricts the iterator to `[begin, end)` and rewinds it to before `begin`.
    fn init_range(&mut self, begin: DocId, end: DocId);

    fn init_full_range(&mut self) {
        self.init_range(BEGIN_DOC_ID, END_DOC_ID);
    }

    /// Moves to the first hit `>= target`, or to the end.
    ///
    /// Only called with `target` greater than the current position while not
    /// at the end.
    fn do_seek(&mut self, target: DocId);

    /// Seeks forward to `target` and returns whether `target` is a hit.
    fn seek(&mut self, target: DocId) -> bool {
        if self.is_at_end() {
            return false;
        }
        if target > self.doc_id() {
            self.do_seek(target);
        }
        !self.is_at_end() && self.doc_id() == target
    }

    /// Writes match details for `doc_id` into `md`.
    ///
    /// `md` must be the match data whose layout allocated the handles this
    /// iterator was created with; slots of any other layout are not touched.
    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData);

    fn is_at_end(&self) -> bool {
        self.doc_id() == END_DOC_ID
    }

    /// Diagnostic description of the iterator tree.
    fn as_string(&self) -> String;
}

/// Position bookkeeping shared by all iterator implementations.
#[derive(Debug, Clone, Copy)]
pub struct SearchCursor {
    doc_id: DocId,
    end_id: DocId,
}

impl SearchCursor {
    pub fn new() -> SearchCursor {
        SearchCursor {
            doc_id: 0,
            end_id: END_DOC_ID,
        }
    }

    #[inline]
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    #[inline]
    pub fn end_id(&self) -> DocId {
        self.end_id
    }

    pub fn init_range(&mut self, begin: DocId, end: DocId) {
        self.end_id = end;
        if begin >= end {
            self.doc_id = END_DOC_ID;
        } else {
            self.doc_id = begin.saturating_sub(1);
        }
    }

    /// Lands on `doc_id`, or at the end if it lies outside the range.
    #[inline]
    pub fn set_doc_id(&mut self, doc_id: DocId) {
        if doc_id >= self.end_id {
            self.doc_id = END_DOC_ID;
        } else {
            self.doc_id = doc_id;
        }
    }

    #[inline]
    pub fn set_at_end(&mut self) {
        self.doc_id = END_DOC_ID;
    }
}

impl Default for SearchCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator that never matches.
pub struct EmptySearch {
    cursor: SearchCursor,
    label: Option<String>,
}

impl EmptySearch {
    pub fn new(label: Option<String>) -> EmptySearch {
        let mut cursor = SearchCursor::new();
        cursor.set_at_end();
        EmptySearch { cursor, label }
    }
}

impl SearchIterator for EmptySearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        self.cursor.set_at_end();
    }

    fn do_seek(&mut self, _target: DocId) {
        self.cursor.set_at_end();
    }

    fn unpack(&mut self, _doc_id: DocId, _md: &mut MatchData) {}

    fn as_string(&self) -> String {
        match &self.label {
            Some(label) => format!("EmptySearch({label})"),
            None => "EmptySearch".to_string(),
        }
    }
}

/// Leapfrogs all `children` to the first document `>= target` that every child
/// matches. Returns `None` when any child runs out, or the document would lie at
/// or beyond `end`.
pub(crate) fn seek_all(
    children: &mut [Box<dyn SearchIterator>],
    mut target: DocId,
    end: DocId,
) -> Option<DocId> {
    if children.is_empty() {
        return None;
    }
    'candidates: loop {
        if target >= end {
            return None;
        }
        for child in children.iter_mut() {
            if !child.seek(target) {
                if child.is_at_end() {
                    return None;
                }
                target = child.doc_id();
                continue 'candidates;
            }
        }
        return Some(target);
    }
}

/// Moves every child that lags behind `target` to its first hit `>= target` and
/// returns the smallest resulting position ([`END_DOC_ID`] if all are exhausted).
pub(crate) fn seek_any(children: &mut [Box<dyn SearchIterator>], target: DocId) -> DocId {
    let mut min = END_DOC_ID;
    for child in children.iter_mut() {
        if child.doc_id() < target {
            child.seek(target);
        }
        min = min.min(child.doc_id());
    }
    min
}

pub(crate) fn init_children(children: &mut [Box<dyn SearchIterator>], begin: DocId, end: DocId) {
    for child in children.iter_mut() {
        child.init_range(begin, end);
    }
}

pub(crate) fn composite_string(
    name: &str,
    params: &str,
    children: &[Box<dyn SearchIterator>],
) -> String {
    let children = children
        .iter()
        .map(|c| c.as_string())
        .collect::<Vec<_>>()
        .join(", ");
    if params.is_empty() {
        format!("{name}[{children}]")
    } else {
        format!("{name}({params})[{children}]")
    }
}
