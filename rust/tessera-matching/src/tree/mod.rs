//! Query tree model.
//!
//! A query is a tree of [`Node`]s whose leaves are [`Term`]s. Operators
//! (`And`, `Or`, `Near`, ...) only structure the tree; everything that is
//! searched for lives in terms. Some terms are composites themselves
//! (phrases, weighted sets, wand terms): their children are terms searched in
//! the composite's fields and never occupy shared match-data slots of their own.
//!
//! Each term carries a [`TermData`] with per-field [`TermFieldData`] entries that
//! are filled in by the compilation passes: field resolution adds the entries,
//! reservation assigns handles, and blueprint building writes document
//! frequencies.

use std::fmt;

use itertools::Itertools;
use tessera_queryeval::TermMatch;
use tessera_queryeval::index_env::FieldId;
use tessera_queryeval::match_data::TermFieldHandle;

pub mod builder;
pub mod stack_dump;

pub use builder::QueryBuilder;

/// Term weight, in percent of the default weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weight(i32);

impl Weight {
    pub const fn new(percent: i32) -> Weight {
        Weight(percent)
    }

    pub fn percent(&self) -> i32 {
        self.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight(100)
    }
}

/// Numeric range `[low;high]`, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub low: i64,
    pub high: i64,
}

impl Range {
    pub fn new(low: i64, high: i64) -> Range {
        Range { low, high }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{};{}]", self.low, self.high)
    }
}

/// Boolean feature query against a predicate field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateQuery {
    features: Vec<(String, String)>,
}

impl PredicateQuery {
    pub fn new() -> PredicateQuery {
        PredicateQuery::default()
    }

    pub fn add_feature(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.features.push((key.into(), value.into()));
        self
    }

    pub fn features(&self) -> &[(String, String)] {
        &self.features
    }
}

impl fmt::Display for PredicateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = self.features.iter().map(|(k, v)| format!("{k}={v}")).join(",");
        write!(f, "{{{features}}}")
    }
}

/// Parameters and tokens of a parallel weak-and term.
#[derive(Debug, Clone, PartialEq)]
pub struct WandTerm {
    pub target_hits: u32,
    pub score_threshold: i64,
    pub threshold_boost_factor: f64,
    pub children: Vec<Term>,
}

/// What a term searches for.
#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Number(String),
    String(String),
    Prefix(String),
    Substring(String),
    Suffix(String),
    Range(Range),
    /// Geo location specification, e.g. `(2,10,10,3,0,1,0,0)` or `[2,10,10,20,20]`.
    Location(String),
    RegExp(String),
    Predicate(PredicateQuery),
    /// Adjacent words, in order.
    Phrase(Vec<Term>),
    /// Tokens with individual weights; the token weights are the child term weights.
    WeightedSet(Vec<Term>),
    DotProduct(Vec<Term>),
    Wand(WandTerm),
}

/// One resolved field of a term.
#[derive(Debug, Clone, PartialEq)]
pub struct TermFieldData {
    field_name: String,
    field_id: FieldId,
    attribute_field: bool,
    handle: Option<TermFieldHandle>,
    doc_freq: f64,
}

impl TermFieldData {
    pub fn new(field_name: impl Into<String>, field_id: FieldId, attribute_field: bool) -> Self {
        TermFieldData {
            field_name: field_name.into(),
            field_id,
            attribute_field,
            handle: None,
            doc_freq: 0.0,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    /// True if the field is attribute backed rather than index backed.
    pub fn attribute_field(&self) -> bool {
        self.attribute_field
    }

    /// The match-data handle reserved for this field, if any.
    pub fn handle(&self) -> Option<TermFieldHandle> {
        self.handle
    }

    /// Estimated fraction of documents matching the term, in `[0, 1]`.
    pub fn doc_freq(&self) -> f64 {
        self.doc_freq
    }

    pub(crate) fn set_handle(&mut self, handle: TermFieldHandle) {
        self.handle = Some(handle);
    }

    pub(crate) fn set_doc_freq(&mut self, doc_freq: f64) {
        self.doc_freq = doc_freq;
    }
}

/// Ranking-relevant properties of a term, plus its resolved fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TermData {
    view: String,
    unique_id: u32,
    weight: Weight,
    term_index: Option<u32>,
    ranked: bool,
    phrase_length: u32,
    fields: Vec<TermFieldData>,
}

impl TermData {
    pub fn new(view: impl Into<String>, unique_id: u32, weight: Weight) -> TermData {
        TermData {
            view: view.into(),
            unique_id,
            weight,
            term_index: None,
            ranked: true,
            phrase_length: 1,
            fields: Vec::new(),
        }
    }

    /// The query-time field name the term was written against.
    pub fn view(&self) -> &str {
        &self.view
    }

    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// Position of the term in the original query, if assigned.
    pub fn term_index(&self) -> Option<u32> {
        self.term_index
    }

    pub fn set_term_index(&mut self, term_index: u32) -> &mut Self {
        self.term_index = Some(term_index);
        self
    }

    pub fn ranked(&self) -> bool {
        self.ranked
    }

    pub fn set_ranked(&mut self, ranked: bool) -> &mut Self {
        self.ranked = ranked;
        self
    }

    /// Number of words for a phrase, 1 for every other term.
    pub fn phrase_length(&self) -> u32 {
        self.phrase_length
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, idx: usize) -> &TermFieldData {
        &self.fields[idx]
    }

    pub fn fields(&self) -> &[TermFieldData] {
        &self.fields
    }

    pub fn lookup_field(&self, field_id: FieldId) -> Option<&TermFieldData> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [TermFieldData] {
        &mut self.fields
    }

    pub(crate) fn set_fields(&mut self, fields: Vec<TermFieldData>) {
        self.fields = fields;
    }
}

/// A leaf of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    data: TermData,
    kind: TermKind,
}

impl Term {
    pub fn new(kind: TermKind, view: impl Into<String>, unique_id: u32, weight: Weight) -> Term {
        Term::from_parts(TermData::new(view, unique_id, weight), kind)
    }

    pub(crate) fn from_parts(mut data: TermData, kind: TermKind) -> Term {
        if let TermKind::Phrase(words) = &kind {
            data.phrase_length = words.len() as u32;
        }
        Term { data, kind }
    }

    pub fn data(&self) -> &TermData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TermData {
        &mut self.data
    }

    pub fn kind(&self) -> &TermKind {
        &self.kind
    }

    /// Child terms of a composite term; empty for simple terms.
    pub fn children(&self) -> &[Term] {
        match &self.kind {
            TermKind::Phrase(children)
            | TermKind::WeightedSet(children)
            | TermKind::DotProduct(children) => children,
            TermKind::Wand(wand) => &wand.children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Term] {
        match &mut self.kind {
            TermKind::Phrase(children)
            | TermKind::WeightedSet(children)
            | TermKind::DotProduct(children) => children,
            TermKind::Wand(wand) => &mut wand.children,
            _ => &mut [],
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TermKind::Phrase(_) | TermKind::WeightedSet(_) | TermKind::DotProduct(_) | TermKind::Wand(_)
        )
    }

    pub fn is_location(&self) -> bool {
        matches!(self.kind, TermKind::Location(_))
    }

    /// Canonical string form of a simple term, as handed to searchables.
    pub fn text(&self) -> Option<String> {
        match &self.kind {
            TermKind::Number(s)
            | TermKind::String(s)
            | TermKind::Prefix(s)
            | TermKind::Substring(s)
            | TermKind::Suffix(s)
            | TermKind::Location(s)
            | TermKind::RegExp(s) => Some(s.clone()),
            TermKind::Range(range) => Some(range.to_string()),
            TermKind::Predicate(predicate) => Some(predicate.to_string()),
            TermKind::Phrase(_)
            | TermKind::WeightedSet(_)
            | TermKind::DotProduct(_)
            | TermKind::Wand(_) => None,
        }
    }

    /// How a simple term is matched; `None` for composites.
    pub fn match_kind(&self) -> Option<TermMatch> {
        let kind = match &self.kind {
            TermKind::Number(_) => TermMatch::Number,
            TermKind::String(_) => TermMatch::Word,
            TermKind::Prefix(_) => TermMatch::Prefix,
            TermKind::Substring(_) => TermMatch::Substring,
            TermKind::Suffix(_) => TermMatch::Suffix,
            TermKind::Range(_) => TermMatch::Range,
            TermKind::Location(_) => TermMatch::Location,
            TermKind::RegExp(_) => TermMatch::Regex,
            TermKind::Predicate(_) => TermMatch::Predicate,
            TermKind::Phrase(_)
            | TermKind::WeightedSet(_)
            | TermKind::DotProduct(_)
            | TermKind::Wand(_) => return None,
        };
        Some(kind)
    }

    /// Short diagnostic description: `view:text` for simple terms.
    pub fn describe(&self) -> String {
        match self.text() {
            Some(text) => format!("{}:{}", self.data.view, text),
            None => {
                let name = match self.kind {
                    TermKind::Phrase(_) => "phrase",
                    TermKind::WeightedSet(_) => "weightedset",
                    TermKind::DotProduct(_) => "dotproduct",
                    _ => "wand",
                };
                let children = self
                    .children()
                    .iter()
                    .filter_map(Term::text)
                    .join(" ");
                format!("{}:{name}({children})", self.data.view)
            }
        }
    }
}

/// Proximity operator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Proximity {
    pub window: u32,
    pub children: Vec<Node>,
}

/// Weak-and operator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WeakAnd {
    pub target_hits: u32,
    pub view: String,
    pub children: Vec<Node>,
}

/// A node of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    And(Vec<Node>),
    Or(Vec<Node>),
    /// The first child minus documents matched by the others.
    AndNot(Vec<Node>),
    /// The first child decides matching; the others only contribute ranking
    /// information.
    Rank(Vec<Node>),
    Near(Proximity),
    /// As `Near`, with children occurring in order.
    ONear(Proximity),
    WeakAnd(WeakAnd),
    Term(Term),
}

impl Node {
    /// Operator children; empty for terms.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::And(children) | Node::Or(children) | Node::AndNot(children) | Node::Rank(children) => {
                children
            }
            Node::Near(p) | Node::ONear(p) => &p.children,
            Node::WeakAnd(w) => &w.children,
            Node::Term(_) => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Node] {
        match self {
            Node::And(children) | Node::Or(children) | Node::AndNot(children) | Node::Rank(children) => {
                children
            }
            Node::Near(p) | Node::ONear(p) => &mut p.children,
            Node::WeakAnd(w) => &mut w.children,
            Node::Term(_) => &mut [],
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Node::Term(term) => Some(term),
            _ => None,
        }
    }

    pub fn as_term_mut(&mut self) -> Option<&mut Term> {
        match self {
            Node::Term(term) => Some(term),
            _ => None,
        }
    }

    /// Visits the top-level terms depth-first, in child order. Children of
    /// composite terms are not visited separately.
    pub fn for_each_term<'a>(&'a self, f: &mut impl FnMut(&'a Term)) {
        match self {
            Node::Term(term) => f(term),
            _ => self.children().iter().for_each(|c| c.for_each_term(f)),
        }
    }

    /// Mutable counterpart of [`for_each_term`](Self::for_each_term), with the
    /// same order.
    pub fn for_each_term_mut(&mut self, f: &mut impl FnMut(&mut Term)) {
        match self {
            Node::Term(term) => f(term),
            _ => self
                .children_mut()
                .iter_mut()
                .for_each(|c| c.for_each_term_mut(f)),
        }
    }
}

impl From<Term> for Node {
    fn from(term: Term) -> Self {
        Node::Term(term)
    }
}
