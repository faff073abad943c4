//! Binary serialization of query trees.
//!
//! A stack dump lists the nodes of a tree in prefix order. Operators carry
//! their arity and are followed by their children; terms carry their header
//! (view, unique id, weight, term index, ranked flag) and value. Items are
//! encoded with `bincode` using the standard configuration with fixed-length
//! integers. Decoding is capped at [`MAX_STACK_DUMP_SIZE`] bytes of claimed
//! memory.

use bincode::{Decode, Encode};
use tessera_common::{Result, error::Error, verify_data};

use super::{Node, PredicateQuery, QueryBuilder, Range, Term, TermData, TermKind, Weight};

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct TermHeader {
    view: String,
    unique_id: u32,
    weight: i32,
    term_index: Option<u32>,
    ranked: bool,
}

impl TermHeader {
    fn of(data: &TermData) -> TermHeader {
        TermHeader {
            view: data.view().to_string(),
            unique_id: data.unique_id(),
            weight: data.weight().percent(),
            term_index: data.term_index(),
            ranked: data.ranked(),
        }
    }

    fn apply(&self, data: &mut TermData) {
        if let Some(term_index) = self.term_index {
            data.set_term_index(term_index);
        }
        data.set_ranked(self.ranked);
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum TermValue {
    Number(String),
    String(String),
    Prefix(String),
    Substring(String),
    Suffix(String),
    Range { low: i64, high: i64 },
    Location(String),
    RegExp(String),
    Predicate(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum StackItem {
    And { arity: u32 },
    Or { arity: u32 },
    AndNot { arity: u32 },
    Rank { arity: u32 },
    Near { arity: u32, window: u32 },
    ONear { arity: u32, window: u32 },
    WeakAnd { arity: u32, target_hits: u32, view: String },
    Phrase { arity: u32, header: TermHeader },
    WeightedSet { arity: u32, header: TermHeader },
    DotProduct { arity: u32, header: TermHeader },
    Wand {
        arity: u32,
        header: TermHeader,
        target_hits: u32,
        score_threshold: i64,
        threshold_boost_factor: f64,
    },
    Term { header: TermHeader, value: TermValue },
}

/// Upper bound on the memory a decoded stack dump may claim.
pub const MAX_STACK_DUMP_SIZE: usize = 16 * 1024 * 1024;

impl StackItem {
    fn arity(&self) -> Option<u32> {
        match self {
            StackItem::And { arity }
            | StackItem::Or { arity }
            | StackItem::AndNot { arity }
            | StackItem::Rank { arity }
            | StackItem::Near { arity, .. }
            | StackItem::ONear { arity, .. }
            | StackItem::WeakAnd { arity, .. }
            | StackItem::Phrase { arity, .. }
            | StackItem::WeightedSet { arity, .. }
            | StackItem::DotProduct { arity, .. }
            | StackItem::Wand { arity, .. } => Some(*arity),
            StackItem::Term { .. } => None,
        }
    }
}

fn binc_config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

fn decode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_limit::<MAX_STACK_DUMP_SIZE>()
}

/// Serializes `node` and everything below it.
///
/// # Errors
///
/// Returns `Encode` if bincode fails to encode an item.
pub fn create(node: &Node) -> Result<Vec<u8>> {
    let mut items = Vec::new();
    push_node(node, &mut items);
    Ok(bincode::encode_to_vec(&items, binc_config())?)
}

/// Rebuilds a tree from a stack dump produced by [`create`].
///
/// # Errors
///
/// Returns `InvalidFormat` if the bytes do not decode or claim more memory
/// than [`MAX_STACK_DUMP_SIZE`], if trailing bytes follow the items, if an
/// operator claims more children than items remain, or if the items do not
/// form exactly one tree.
pub fn parse(bytes: &[u8]) -> Result<Node> {
    let (items, read): (Vec<StackItem>, usize) = bincode::decode_from_slice(bytes, decode_config())?;
    verify_data!(stack_dump, read == bytes.len());
    let total = items.len();
    let mut builder = QueryBuilder::new();
    for (idx, item) in items.into_iter().enumerate() {
        let remaining = total - idx - 1;
        if item.arity().is_some_and(|arity| arity as usize > remaining) {
            return Err(Error::invalid_format(
                "stack dump",
                format!("item {idx} claims more children than the {remaining} item(s) left"),
            ));
        }
        add_item(&mut builder, item).map_err(|e| Error::invalid_format("stack dump", e.to_string()))?;
    }
    builder
        .build()
        .map_err(|e| Error::invalid_format("stack dump", e.to_string()))
}

fn arity(children: usize) -> u32 {
    children as u32
}

fn push_node(node: &Node, items: &mut Vec<StackItem>) {
    let item = match node {
        Node::And(children) => StackItem::And {
            arity: arity(children.len()),
        },
        Node::Or(children) => StackItem::Or {
            arity: arity(children.len()),
        },
        Node::AndNot(children) => StackItem::AndNot {
            arity: arity(children.len()),
        },
        Node::Rank(children) => StackItem::Rank {
            arity: arity(children.len()),
        },
        Node::Near(near) => StackItem::Near {
            arity: arity(near.children.len()),
            window: near.window,
        },
        Node::ONear(near) => StackItem::ONear {
            arity: arity(near.children.len()),
            window: near.window,
        },
        Node::WeakAnd(wand) => StackItem::WeakAnd {
            arity: arity(wand.children.len()),
            target_hits: wand.target_hits,
            view: wand.view.clone(),
        },
        Node::Term(term) => {
            push_term(term, items);
            return;
        }
    };
    items.push(item);
    node.children().iter().for_each(|c| push_node(c, items));
}

fn push_term(term: &Term, items: &mut Vec<StackItem>) {
    let header = TermHeader::of(term.data());
    let arity = arity(term.children().len());
    let item = match term.kind() {
        TermKind::Number(s) => term_item(header, TermValue::Number(s.clone())),
        TermKind::String(s) => term_item(header, TermValue::String(s.clone())),
        TermKind::Prefix(s) => term_item(header, TermValue::Prefix(s.clone())),
        TermKind::Substring(s) => term_item(header, TermValue::Substring(s.clone())),
        TermKind::Suffix(s) => term_item(header, TermValue::Suffix(s.clone())),
        TermKind::Range(r) => term_item(
            header,
            TermValue::Range {
                low: r.low,
                high: r.high,
            },
        ),
        TermKind::Location(s) => term_item(header, TermValue::Location(s.clone())),
        TermKind::RegExp(s) => term_item(header, TermValue::RegExp(s.clone())),
        TermKind::Predicate(p) => term_item(header, TermValue::Predicate(p.features().to_vec())),
        TermKind::Phrase(_) => StackItem::Phrase { arity, header },
        TermKind::WeightedSet(_) => StackItem::WeightedSet { arity, header },
        TermKind::DotProduct(_) => StackItem::DotProduct { arity, header },
        TermKind::Wand(wand) => StackItem::Wand {
            arity,
            header,
            target_hits: wand.target_hits,
            score_threshold: wand.score_threshold,
            threshold_boost_factor: wand.threshold_boost_factor,
        },
    };
    items.push(item);
    term.children().iter().for_each(|c| push_term(c, items));
}

fn term_item(header: TermHeader, value: TermValue) -> StackItem {
    StackItem::Term { header, value }
}

fn add_item(builder: &mut QueryBuilder, item: StackItem) -> Result<()> {
    let (header, data) = match item {
        StackItem::And { arity } => return builder.add_and(arity as usize),
        StackItem::Or { arity } => return builder.add_or(arity as usize),
        StackItem::AndNot { arity } => return builder.add_and_not(arity as usize),
        StackItem::Rank { arity } => return builder.add_rank(arity as usize),
        StackItem::Near { arity, window } => return builder.add_near(arity as usize, window),
        StackItem::ONear { arity, window } => return builder.add_onear(arity as usize, window),
        StackItem::WeakAnd {
            arity,
            target_hits,
            view,
        } => return builder.add_weak_and(arity as usize, target_hits, view),
        StackItem::Phrase { arity, header } => {
            let data = builder.add_phrase(arity as usize, &header.view, header.unique_id, Weight::new(header.weight))?;
            (header, data)
        }
        StackItem::WeightedSet { arity, header } => {
            let data = builder.add_weighted_set_term(
                arity as usize,
                &header.view,
                header.unique_id,
                Weight::new(header.weight),
            )?;
            (header, data)
        }
        StackItem::DotProduct { arity, header } => {
            let data =
                builder.add_dot_product(arity as usize, &header.view, header.unique_id, Weight::new(header.weight))?;
            (header, data)
        }
        StackItem::Wand {
            arity,
            header,
            target_hits,
            score_threshold,
            threshold_boost_factor,
        } => {
            let data = builder.add_wand_term(
                arity as usize,
                &header.view,
                header.unique_id,
                Weight::new(header.weight),
                target_hits,
                score_threshold,
                threshold_boost_factor,
            )?;
            (header, data)
        }
        StackItem::Term { header, value } => {
            let kind = match value {
                TermValue::Number(s) => TermKind::Number(s),
                TermValue::String(s) => TermKind::String(s),
                TermValue::Prefix(s) => TermKind::Prefix(s),
                TermValue::Substring(s) => TermKind::Substring(s),
                TermValue::Suffix(s) => TermKind::Suffix(s),
                TermValue::Range { low, high } => TermKind::Range(Range::new(low, high)),
                TermValue::Location(s) => TermKind::Location(s),
                TermValue::RegExp(s) => TermKind::RegExp(s),
                TermValue::Predicate(features) => TermKind::Predicate(
                    features
                        .into_iter()
                        .fold(PredicateQuery::new(), |p, (k, v)| p.add_feature(k, v)),
                ),
            };
            let data = builder.add_term(kind, &header.view, header.unique_id, Weight::new(header.weight))?;
            (header, data)
        }
    };
    header.apply(data);
    Ok(())
}
