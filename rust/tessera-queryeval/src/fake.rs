//! In-memory searchable with canned posting lists, for tests of code that
//! builds and evaluates blueprints.
//!
//! ```
//! use tessera_queryeval::fake::{FakeResult, FakeSearchable};
//!
//! let mut searchable = FakeSearchable::new();
//! searchable
//!     .set_tag("idx0")
//!     .add_result("title", "foo", FakeResult::new().doc(3).pos(1).doc(7).pos(4).len(10));
//! ```

use ahash::AHashMap;
use tessera_common::{Result, error::Error};

use crate::blueprint::{Blueprint, LeafBlueprint};
use crate::estimate::HitEstimate;
use crate::field_spec::FieldSpec;
use crate::match_data::{MatchData, MatchPosition, TermFieldHandle};
use crate::search::{DocId, SearchCursor, SearchIterator};
use crate::searchable::{QueryTerm, Searchable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub id: u32,
    pub weight: i32,
    pub length: u32,
    pub positions: Vec<u32>,
}

impl FakeElement {
    fn new(id: u32) -> FakeElement {
        FakeElement {
            id,
            weight: 1,
            length: u32::MAX,
            positions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDocument {
    pub doc_id: DocId,
    pub elements: Vec<FakeElement>,
}

/// Posting list of one term in one field, built fluently.
///
/// `elem`, `weight`, `len` and `pos` apply to the most recently added
/// document; `pos`, `len` and `weight` implicitly open element 0 when the
/// document has none yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeResult {
    docs: Vec<FakeDocument>,
}

impl FakeResult {
    pub fn new() -> FakeResult {
        FakeResult::default()
    }

    pub fn doc(mut self, doc_id: DocId) -> Self {
        self.docs.push(FakeDocument {
            doc_id,
            elements: Vec::new(),
        });
        self
    }

    pub fn elem(mut self, id: u32) -> Self {
        if let Some(doc) = self.docs.last_mut() {
            doc.elements.push(FakeElement::new(id));
        }
        self
    }

    pub fn weight(mut self, weight: i32) -> Self {
        if let Some(elem) = self.current_element() {
            elem.weight = weight;
        }
        self
    }

    pub fn len(mut self, length: u32) -> Self {
        if let Some(elem) = self.current_element() {
            elem.length = length;
        }
        self
    }

    pub fn pos(mut self, position: u32) -> Self {
        if let Some(elem) = self.current_element() {
            elem.positions.push(position);
        }
        self
    }

    pub fn docs(&self) -> &[FakeDocument] {
        &self.docs
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn current_element(&mut self) -> Option<&mut FakeElement> {
        let doc = self.docs.last_mut()?;
        if doc.elements.is_empty() {
            doc.elements.push(FakeElement::new(0));
        }
        doc.elements.last_mut()
    }

    /// Documents in id order, with positions sorted by (element, position).
    fn normalized(&self) -> Vec<FakeDocument> {
        let mut docs = self.docs.clone();
        docs.sort_by_key(|d| d.doc_id);
        docs.dedup_by_key(|d| d.doc_id);
        for doc in docs.iter_mut() {
            doc.elements.sort_by_key(|e| e.id);
            for elem in doc.elements.iter_mut() {
                elem.positions.sort_unstable();
            }
        }
        docs
    }
}

/// A searchable answering `(field, term)` lookups from registered results.
///
/// Unregistered lookups yield a leaf with no hits.
#[derive(Debug, Clone)]
pub struct FakeSearchable {
    tag: String,
    results: AHashMap<(String, String), FakeResult>,
    fail_on_fetch: bool,
}

impl FakeSearchable {
    pub fn new() -> FakeSearchable {
        FakeSearchable {
            tag: "fake".to_string(),
            results: AHashMap::new(),
            fail_on_fetch: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tag = tag.into();
        self
    }

    pub fn add_result(
        &mut self,
        field: impl Into<String>,
        term: impl Into<String>,
        result: FakeResult,
    ) -> &mut Self {
        self.results.insert((field.into(), term.into()), result);
        self
    }

    /// Makes every leaf created from now on fail in `fetch_postings`.
    pub fn set_fail_on_fetch(&mut self, fail: bool) -> &mut Self {
        self.fail_on_fetch = fail;
        self
    }

    fn lookup(&self, field: &str, term: &str) -> Option<&FakeResult> {
        self.results.get(&(field.to_string(), term.to_string()))
    }
}

impl Default for FakeSearchable {
    fn default() -> Self {
        Self::new()
    }
}

impl Searchable for FakeSearchable {
    fn create_blueprint(&self, field: &FieldSpec, term: &QueryTerm<'_>) -> Result<Blueprint> {
        let result = self
            .lookup(field.name(), term.text())
            .cloned()
            .unwrap_or_default();
        Ok(Blueprint::leaf(FakeBlueprint {
            tag: self.tag.clone(),
            field: field.clone(),
            term: term.text().to_string(),
            result,
            docs: Vec::new(),
            fail_on_fetch: self.fail_on_fetch,
        }))
    }
}

/// Leaf blueprint of a [`FakeSearchable`] lookup.
pub struct FakeBlueprint {
    tag: String,
    field: FieldSpec,
    term: String,
    result: FakeResult,
    docs: Vec<FakeDocument>,
    fail_on_fetch: bool,
}

impl FakeBlueprint {
    fn label(&self) -> String {
        format!(
            "tag={}, field={}, term={}",
            self.tag,
            self.field.name(),
            self.term
        )
    }
}

impl LeafBlueprint for FakeBlueprint {
    fn estimate(&self) -> HitEstimate {
        HitEstimate::new(self.result.doc_count() as u32)
    }

    fn fetch_postings(&mut self, _strict: bool) -> Result<()> {
        if self.fail_on_fetch {
            return Err(Error::search_context_message(
                self.tag.clone(),
                format!("cannot fetch postings for {}:{}", self.field.name(), self.term),
            ));
        }
        self.docs = self.result.normalized();
        Ok(())
    }

    fn create_leaf_search(&self, md: &MatchData) -> Result<Box<dyn SearchIterator>> {
        md.check_handle(self.field.handle())?;
        Ok(Box::new(FakeSearch {
            cursor: SearchCursor::new(),
            label: self.label(),
            handle: self.field.handle(),
            docs: self.docs.clone(),
            next: 0,
        }))
    }

    fn describe(&self) -> String {
        format!("Fake({})", self.label())
    }

    fn handles(&self) -> Vec<TermFieldHandle> {
        vec![self.field.handle()]
    }
}

/// Iterator over a fetched [`FakeResult`], unpacking occurrences into one slot.
pub struct FakeSearch {
    cursor: SearchCursor,
    label: String,
    handle: TermFieldHandle,
    docs: Vec<FakeDocument>,
    next: usize,
}

impl SearchIterator for FakeSearch {
    fn doc_id(&self) -> DocId {
        self.cursor.doc_id()
    }

    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.cursor.init_range(begin, end);
        self.next = 0;
    }

    fn do_seek(&mut self, target: DocId) {
        self.next += self.docs[self.next..].partition_point(|d| d.doc_id < target);
        match self.docs.get(self.next) {
            Some(doc) => self.cursor.set_doc_id(doc.doc_id),
            None => self.cursor.set_at_end(),
        }
    }

    fn unpack(&mut self, doc_id: DocId, md: &mut MatchData) {
        let Some(doc) = self.docs.get(self.next).filter(|d| d.doc_id == doc_id) else {
            return;
        };
        let Some(tfmd) = md.resolve_mut(self.handle) else {
            return;
        };
        tfmd.reset(doc_id);
        for elem in &doc.elements {
            for &position in &elem.positions {
                tfmd.append_position(
                    MatchPosition::new(position)
                        .with_element(elem.id, elem.length)
                        .with_weight(elem.weight),
                );
            }
        }
    }

    fn as_string(&self) -> String {
        format!("FakeSearch({})", self.label)
    }
}
