use std::collections::BTreeSet;

use tessera_common::error::ErrorKind;
use tessera_matching::blueprint_builder;
use tessera_matching::fake_search_context::FakeSearchContext;
use tessera_matching::reserve::{reserve_handles, reserve_term};
use tessera_matching::resolve_view::{resolve_term, resolve_views};
use tessera_matching::term_extractor::extract_terms;
use tessera_matching::tree::{Node, QueryBuilder, Range, Term, TermKind, Weight, stack_dump};
use tessera_matching::{Query, RequestContext, SearchContext, ViewResolver};
use tessera_queryeval::fake::{FakeResult, FakeSearchable};
use tessera_queryeval::index_env::{CollectionType, FieldInfo, FieldType, SimpleIndexEnvironment};
use tessera_queryeval::simple::{SimpleBlueprint, SimpleResult};
use tessera_queryeval::{Blueprint, FieldSpec, MatchData, MatchDataLayout, QueryTerm, SearchIterator, Searchable, TermMatch};

const FIELD: &str = "field";
const RESOLVED_FIELD1: &str = "resolved1";
const RESOLVED_FIELD2: &str = "resolved2";
const UNKNOWN_FIELD: &str = "unknown_field";
const FLOAT_TERM: &str = "3.14";
const INT_TERM: &str = "42";
const PREFIX_TERM: &str = "foo";
const STRING_TERM: &str = "bar";
const STRING_ID: u32 = 4;
const STRING_WEIGHT: Weight = Weight::new(4);
const SUBSTRING_TERM: &str = "baz";
const SUFFIX_TERM: &str = "qux";
const PHRASE_TERM: &str = "quux";
const RANGE_TERM: Range = Range { low: 32, high: 47 };
const DOC_COUNT: u32 = 100;
const FIELD_ID: u32 = 154;
const TERM_INDEX: u32 = 23;
const TERM_COUNT: usize = 8;

fn plain_index_env() -> SimpleIndexEnvironment {
    SimpleIndexEnvironment::new().with_field(FieldInfo::new(
        FieldType::Index,
        CollectionType::Single,
        FIELD,
        FIELD_ID,
    ))
}

fn resolved_index_env() -> SimpleIndexEnvironment {
    SimpleIndexEnvironment::new()
        .with_field(FieldInfo::new(
            FieldType::Index,
            CollectionType::Single,
            RESOLVED_FIELD1,
            FIELD_ID,
        ))
        .with_field(FieldInfo::new(
            FieldType::Index,
            CollectionType::Single,
            RESOLVED_FIELD2,
            FIELD_ID + 1,
        ))
}

fn attribute_index_env() -> SimpleIndexEnvironment {
    SimpleIndexEnvironment::new().with_field(FieldInfo::new(
        FieldType::Attribute,
        CollectionType::Single,
        FIELD,
        0,
    ))
}

fn view_resolver() -> ViewResolver {
    let mut resolver = ViewResolver::new();
    resolver.add(FIELD, RESOLVED_FIELD1).add(FIELD, RESOLVED_FIELD2);
    resolver
}

fn build_query_tree(resolver: &ViewResolver, env: &SimpleIndexEnvironment) -> Node {
    let mut builder = QueryBuilder::new();
    builder.add_or(TERM_COUNT).unwrap();
    builder.add_number_term(FLOAT_TERM, FIELD, 0, Weight::new(0)).unwrap();
    builder.add_number_term(INT_TERM, FIELD, 1, Weight::new(0)).unwrap();
    builder.add_prefix_term(PREFIX_TERM, FIELD, 2, Weight::new(0)).unwrap();
    builder.add_range_term(RANGE_TERM, FIELD, 3, Weight::new(0)).unwrap();
    builder
        .add_string_term(STRING_TERM, FIELD, STRING_ID, STRING_WEIGHT)
        .unwrap()
        .set_term_index(TERM_INDEX);
    builder.add_substring_term(SUBSTRING_TERM, FIELD, 5, Weight::new(0)).unwrap();
    builder.add_suffix_term(SUFFIX_TERM, FIELD, 6, Weight::new(0)).unwrap();
    builder.add_phrase(2, FIELD, 7, Weight::new(0)).unwrap();
    builder.add_string_term(PHRASE_TERM, FIELD, 8, Weight::new(0)).unwrap();
    builder.add_string_term(PHRASE_TERM, FIELD, 9, Weight::new(0)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, resolver, env);
    node
}

fn single_term(term: &str, view: &str, id: u32, weight: Weight) -> Node {
    let mut builder = QueryBuilder::new();
    builder.add_string_term(term, view, id, weight).unwrap();
    builder.build().unwrap()
}

fn reserve(node: &mut Node) -> MatchDataLayout {
    let mut layout = MatchDataLayout::new();
    reserve_handles(node, &mut layout);
    layout
}

fn build(node: &mut Node, context: &dyn SearchContext) -> Blueprint {
    blueprint_builder::build(&RequestContext::default(), node, context).unwrap()
}

fn get_iterator(node: &mut Node, context: &dyn SearchContext) -> (Box<dyn SearchIterator>, MatchData) {
    let layout = reserve(node);
    let md = layout.create_match_data();
    let blueprint = build(node, context);
    let mut search = blueprint.fetch_postings(true).unwrap().create_search(&md).unwrap();
    search.init_full_range();
    (search, md)
}

fn fake_searchable(term: &str, doc1: u32, doc2: u32) -> FakeSearchable {
    let mut searchable = FakeSearchable::new();
    searchable.add_result(FIELD, term, FakeResult::new().doc(doc1).pos(2).doc(doc2).pos(3));
    searchable
}

/// Expected estimate of each term of the standard query tree, keyed by kind
/// and text.
fn expected_hits(term: &Term) -> u32 {
    match term.kind() {
        TermKind::Number(_) => 1,
        TermKind::Prefix(_) => 1,
        TermKind::Range(_) => 2,
        TermKind::String(_) => 2,
        TermKind::Substring(_) => 0,
        TermKind::Suffix(_) => 2,
        TermKind::Phrase(_) => 0,
        other => panic!("unexpected term {other:?}"),
    }
}

fn check_lookups(node: &Node) {
    let mut checked = 0;
    node.for_each_term(&mut |term| {
        let expected = expected_hits(term);
        assert_eq!(
            term.data().field(0).doc_freq(),
            expected as f64 / DOC_COUNT as f64,
            "{}",
            term.describe()
        );
        checked += 1;
    });
    assert_eq!(checked, TERM_COUNT);
}

#[test]
fn test_match_data_is_reserved() {
    let mut node = build_query_tree(&ViewResolver::new(), &plain_index_env());
    let layout = reserve(&mut node);
    assert_eq!(layout.create_match_data().num_term_fields(), TERM_COUNT);
}

#[test]
fn test_match_data_is_reserved_for_each_field_in_a_view() {
    let mut node = build_query_tree(&view_resolver(), &resolved_index_env());
    let layout = reserve(&mut node);
    assert_eq!(layout.create_match_data().num_term_fields(), TERM_COUNT * 2);
}

#[test]
fn test_terms_are_looked_up() {
    let mut node = build_query_tree(&ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::default();
    context.add_idx(1).add_idx(2);
    context
        .idx(0)
        .add_result(FIELD, PREFIX_TERM, FakeResult::new().doc(1).pos(2))
        .add_result(FIELD, STRING_TERM, FakeResult::new().doc(2).pos(3).doc(3).pos(4))
        .add_result(FIELD, INT_TERM, FakeResult::new().doc(4).pos(5));
    context
        .idx(1)
        .add_result(FIELD, STRING_TERM, FakeResult::new().doc(6).pos(7))
        .add_result(FIELD, SUFFIX_TERM, FakeResult::new().doc(7).pos(8).doc(8).pos(9))
        .add_result(FIELD, FLOAT_TERM, FakeResult::new().doc(9).pos(10))
        .add_result(FIELD, INT_TERM, FakeResult::new().doc(10).pos(11))
        .add_result(
            FIELD,
            RANGE_TERM.to_string(),
            FakeResult::new().doc(12).pos(13).doc(13).pos(14),
        );
    context.set_limit(DOC_COUNT + 1);

    reserve(&mut node);
    build(&mut node, &context);
    check_lookups(&node);
}

#[test]
fn test_terms_are_looked_up_in_multiple_fields_from_a_view() {
    let mut node = build_query_tree(&view_resolver(), &resolved_index_env());

    let mut context = FakeSearchContext::default();
    context.add_idx(1).add_idx(2);
    context
        .idx(0)
        .add_result(RESOLVED_FIELD1, PREFIX_TERM, FakeResult::new().doc(1).pos(2))
        .add_result(
            RESOLVED_FIELD2,
            STRING_TERM,
            FakeResult::new().doc(2).pos(3).doc(3).pos(4),
        )
        .add_result(RESOLVED_FIELD1, INT_TERM, FakeResult::new().doc(4).pos(5));
    context
        .idx(1)
        .add_result(RESOLVED_FIELD1, STRING_TERM, FakeResult::new().doc(6).pos(7))
        .add_result(
            RESOLVED_FIELD2,
            SUFFIX_TERM,
            FakeResult::new().doc(7).pos(8).doc(8).pos(9),
        )
        .add_result(RESOLVED_FIELD1, FLOAT_TERM, FakeResult::new().doc(9).pos(10))
        .add_result(RESOLVED_FIELD2, INT_TERM, FakeResult::new().doc(10).pos(11))
        .add_result(
            RESOLVED_FIELD1,
            RANGE_TERM.to_string(),
            FakeResult::new().doc(12).pos(13).doc(13).pos(14),
        );
    context.set_limit(DOC_COUNT + 1);

    reserve(&mut node);
    build(&mut node, &context);
    check_lookups(&node);
}

#[test]
fn test_attribute_terms_are_looked_up_in_attribute_source() {
    let mut node = single_term(STRING_TERM, FIELD, 1, Weight::new(2));
    resolve_views(&mut node, &ViewResolver::new(), &attribute_index_env());

    let mut context = FakeSearchContext::default();
    context.add_idx(1);
    context
        .attr()
        .add_result(FIELD, STRING_TERM, FakeResult::new().doc(1).pos(2));

    reserve(&mut node);
    let blueprint = build(&mut node, &context);
    assert!(!blueprint.estimate().is_empty());
    assert_eq!(blueprint.estimate().est_hits(), 1);
}

#[test]
fn test_attribute_term_data_handles_are_allocated() {
    let mut node = single_term(STRING_TERM, FIELD, 1, Weight::new(2));
    resolve_views(&mut node, &ViewResolver::new(), &attribute_index_env());

    let context = FakeSearchContext::default();
    let layout = reserve(&mut node);
    build(&mut node, &context);

    assert_eq!(layout.create_match_data().num_term_fields(), 1);
    assert!(node.as_term().unwrap().data().field(0).attribute_field());
}

#[test]
fn test_term_data_is_filled_in() {
    let mut node = build_query_tree(&view_resolver(), &resolved_index_env());

    let mut context = FakeSearchContext::default();
    context.add_idx(1).idx(0).add_result(
        RESOLVED_FIELD1,
        STRING_TERM,
        FakeResult::new().doc(1).pos(2).doc(5).pos(3),
    );
    context.set_limit(DOC_COUNT + 1);

    reserve(&mut node);
    build(&mut node, &context);

    let mut strings = 0;
    let mut phrases = 0;
    node.for_each_term(&mut |term| match term.kind() {
        TermKind::String(_) => {
            let data = term.data();
            assert_eq!(data.weight().percent(), STRING_WEIGHT.percent());
            assert_eq!(data.phrase_length(), 1);
            assert_eq!(data.term_index(), Some(TERM_INDEX));
            assert_eq!(data.unique_id(), STRING_ID);
            assert_eq!(data.num_fields(), 2);
            for (i, field) in data.fields().iter().enumerate() {
                assert!((field.doc_freq() - 2.0 / DOC_COUNT as f64).abs() < 1.0e-6);
                assert!(!field.attribute_field());
                assert_eq!(field.field_id(), FIELD_ID + i as u32);
            }
            strings += 1;
        }
        TermKind::Phrase(_) => {
            assert_eq!(term.data().phrase_length(), 2);
            phrases += 1;
        }
        _ => {}
    });
    assert_eq!((strings, phrases), (1, 1));
}

#[test]
fn test_term_index_defaults_to_unset() {
    let node = single_term(STRING_TERM, FIELD, STRING_ID, STRING_WEIGHT);
    assert_eq!(node.as_term().unwrap().data().term_index(), None);
}

#[test]
fn test_single_index_can_use_blending_as_blacklisting() {
    let mut node = single_term(STRING_TERM, FIELD, 1, Weight::new(2));
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::default();
    *context.add_idx(1).idx(0) = fake_searchable(STRING_TERM, 2, 5);
    context.selector_mut().set_source(5, 1);

    let (mut iterator, mut md) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(1));
    assert!(!iterator.seek(2));
    assert!(iterator.seek(5));
    iterator.unpack(5, &mut md);
    let handle = node.as_term().unwrap().data().field(0).handle().unwrap();
    assert_eq!(md.resolve(handle).unwrap().doc_id(), 5);
}

#[test]
fn test_iterators_are_built_with_blending() {
    let mut node = single_term(STRING_TERM, FIELD, 1, Weight::new(2));
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::default();
    *context.add_idx(1).idx(0) = fake_searchable(STRING_TERM, 3, 7);
    *context.add_idx(0).idx(1) = fake_searchable(STRING_TERM, 2, 6);
    context.selector_mut().set_source(3, 1).set_source(7, 1);

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(1));
    assert!(iterator.seek(2));
    assert!(iterator.seek(3));
    assert!(iterator.seek(6));
    assert!(iterator.seek(7));
}

#[test]
fn test_blending_only_reports_selected_owner() {
    let mut node = single_term(STRING_TERM, FIELD, 1, Weight::new(2));
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::default();
    context.add_idx(0).idx(0).add_result(
        FIELD,
        STRING_TERM,
        FakeResult::new().doc(2).doc(5).doc(6),
    );
    *context.add_idx(1).idx(1) = fake_searchable(STRING_TERM, 3, 7);
    context
        .selector_mut()
        .set_source(3, 1)
        .set_source(5, 1)
        .set_source(7, 1);

    let (mut iterator, _) = get_iterator(&mut node, &context);
    let seen = [1, 2, 3, 5, 6, 7].map(|doc| iterator.seek(doc));
    assert_eq!(seen, [false, true, true, false, true, true]);
}

#[test]
fn test_iterators_are_built_for_all_term_nodes() {
    let mut node = build_query_tree(&ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(42);
    context
        .add_idx(0)
        .idx(0)
        .add_result(FIELD, FLOAT_TERM, FakeResult::new().doc(2).pos(2))
        .add_result(FIELD, INT_TERM, FakeResult::new().doc(4).pos(2))
        .add_result(FIELD, PREFIX_TERM, FakeResult::new().doc(8).pos(2))
        .add_result(FIELD, RANGE_TERM.to_string(), FakeResult::new().doc(15).pos(2))
        .add_result(FIELD, STRING_TERM, FakeResult::new().doc(16).pos(2))
        .add_result(FIELD, SUBSTRING_TERM, FakeResult::new().doc(23).pos(2))
        .add_result(FIELD, SUFFIX_TERM, FakeResult::new().doc(42).pos(2));

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(1));
    for doc in [2, 4, 8, 15, 16, 23, 42] {
        assert!(iterator.seek(doc), "doc {doc}");
    }
}

#[test]
fn test_near_iterators_can_be_built() {
    let mut builder = QueryBuilder::new();
    builder.add_near(2, 4).unwrap();
    builder.add_string_term(STRING_TERM, FIELD, 1, Weight::new(2)).unwrap();
    builder.add_string_term(PREFIX_TERM, FIELD, 1, Weight::new(2)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(8);
    context
        .add_idx(0)
        .idx(0)
        .add_result(
            FIELD,
            PREFIX_TERM,
            FakeResult::new().doc(4).pos(2).len(50).doc(8).pos(2).len(50),
        )
        .add_result(
            FIELD,
            STRING_TERM,
            FakeResult::new().doc(4).pos(40).len(50).doc(8).pos(5).len(50),
        );

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(4));
    assert!(iterator.seek(8));
}

#[test]
fn test_onear_iterators_can_be_built() {
    let mut builder = QueryBuilder::new();
    builder.add_onear(2, 4).unwrap();
    builder.add_string_term(STRING_TERM, FIELD, 1, Weight::new(2)).unwrap();
    builder.add_string_term(PREFIX_TERM, FIELD, 1, Weight::new(2)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(8);
    context
        .add_idx(0)
        .idx(0)
        .add_result(
            FIELD,
            STRING_TERM,
            FakeResult::new().doc(4).pos(5).len(50).doc(8).pos(2).len(50),
        )
        .add_result(
            FIELD,
            PREFIX_TERM,
            FakeResult::new().doc(4).pos(2).len(50).doc(8).pos(5).len(50),
        );

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(4));
    assert!(iterator.seek(8));
}

#[test]
fn test_phrase_iterators_can_be_built() {
    let mut builder = QueryBuilder::new();
    builder.add_phrase(3, FIELD, 0, Weight::new(42)).unwrap();
    builder.add_string_term(STRING_TERM, FIELD, 1, Weight::new(2)).unwrap();
    builder.add_string_term(PREFIX_TERM, FIELD, 1, Weight::new(2)).unwrap();
    builder.add_string_term(SUFFIX_TERM, FIELD, 1, Weight::new(2)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(9);
    context
        .add_idx(0)
        .idx(0)
        .add_result(
            FIELD,
            STRING_TERM,
            FakeResult::new()
                .doc(4)
                .pos(3)
                .len(50)
                .doc(5)
                .pos(2)
                .len(50)
                .doc(8)
                .pos(2)
                .len(50)
                .doc(9)
                .pos(2)
                .len(50),
        )
        .add_result(
            FIELD,
            PREFIX_TERM,
            FakeResult::new()
                .doc(4)
                .pos(2)
                .len(50)
                .doc(5)
                .pos(4)
                .len(50)
                .doc(8)
                .pos(3)
                .len(50),
        )
        .add_result(
            FIELD,
            SUFFIX_TERM,
            FakeResult::new()
                .doc(4)
                .pos(1)
                .len(50)
                .doc(5)
                .pos(5)
                .len(50)
                .doc(8)
                .pos(4)
                .len(50),
        );

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(4));
    assert!(!iterator.seek(5));
    assert!(iterator.seek(8));
    assert!(!iterator.seek(9));
    assert!(iterator.is_at_end());
}

#[test]
fn test_phrase_requires_adjacent_positions() {
    let mut builder = QueryBuilder::new();
    builder.add_phrase(2, FIELD, 0, Weight::default()).unwrap();
    builder.add_string_term(PHRASE_TERM, FIELD, 1, Weight::default()).unwrap();
    builder.add_string_term(PHRASE_TERM, FIELD, 2, Weight::default()).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(10);
    context.add_idx(0).idx(0).add_result(
        FIELD,
        PHRASE_TERM,
        FakeResult::new().doc(1).pos(1).pos(3).doc(2).pos(4).pos(5),
    );

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(1));
    assert!(iterator.seek(2));
}

fn near_over_view(ordered: bool) -> Node {
    let mut builder = QueryBuilder::new();
    if ordered {
        builder.add_onear(2, 4).unwrap();
    } else {
        builder.add_near(2, 4).unwrap();
    }
    builder.add_string_term(STRING_TERM, FIELD, 1, Weight::default()).unwrap();
    builder.add_prefix_term(PREFIX_TERM, FIELD, 2, Weight::default()).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &view_resolver(), &resolved_index_env());
    node
}

#[test]
fn test_near_matches_within_one_field_of_a_view() {
    let mut node = near_over_view(false);

    let mut context = FakeSearchContext::new(10);
    context
        .add_idx(0)
        .idx(0)
        .add_result(
            RESOLVED_FIELD1,
            STRING_TERM,
            FakeResult::new().doc(4).pos(2).doc(6).pos(40).doc(8).pos(5),
        )
        .add_result(RESOLVED_FIELD1, PREFIX_TERM, FakeResult::new().doc(6).pos(2).doc(8).pos(2))
        .add_result(RESOLVED_FIELD2, STRING_TERM, FakeResult::new().doc(6).pos(5))
        .add_result(RESOLVED_FIELD2, PREFIX_TERM, FakeResult::new().doc(4).pos(3).doc(6).pos(7));

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(4), "occurrences in different fields are not near");
    assert!(iterator.seek(6));
    assert!(iterator.seek(8));
}

#[test]
fn test_onear_matches_within_one_field_of_a_view() {
    let mut node = near_over_view(true);

    let mut context = FakeSearchContext::new(10);
    context
        .add_idx(0)
        .idx(0)
        .add_result(RESOLVED_FIELD1, STRING_TERM, FakeResult::new().doc(4).pos(2).doc(8).pos(5))
        .add_result(RESOLVED_FIELD1, PREFIX_TERM, FakeResult::new().doc(8).pos(2))
        .add_result(RESOLVED_FIELD2, STRING_TERM, FakeResult::new().doc(6).pos(3))
        .add_result(RESOLVED_FIELD2, PREFIX_TERM, FakeResult::new().doc(4).pos(4).doc(6).pos(5));

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(4), "occurrences in different fields are not near");
    assert!(iterator.seek(6));
    assert!(!iterator.seek(8));
    assert!(iterator.is_at_end());
}

#[test]
fn test_near_with_nested_phrase() {
    let mut builder = QueryBuilder::new();
    builder.add_near(2, 3).unwrap();
    builder.add_phrase(2, FIELD, 1, Weight::default()).unwrap();
    builder.add_string_term(PHRASE_TERM, FIELD, 2, Weight::default()).unwrap();
    builder.add_string_term(STRING_TERM, FIELD, 3, Weight::default()).unwrap();
    builder.add_prefix_term(PREFIX_TERM, FIELD, 4, Weight::default()).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::new(10);
    context
        .add_idx(0)
        .idx(0)
        .add_result(FIELD, PHRASE_TERM, FakeResult::new().doc(1).pos(1).doc(2).pos(10).doc(3).pos(1))
        .add_result(FIELD, STRING_TERM, FakeResult::new().doc(1).pos(2).doc(2).pos(11).doc(3).pos(5))
        .add_result(FIELD, PREFIX_TERM, FakeResult::new().doc(1).pos(4).doc(2).pos(2).doc(3).pos(2));

    let layout = reserve(&mut node);
    assert_eq!(layout.num_term_fields(), 2);
    let md = layout.create_match_data();
    let blueprint = build(&mut node, &context);
    let mut iterator = blueprint.fetch_postings(true).unwrap().create_search(&md).unwrap();
    iterator.init_full_range();

    assert!(iterator.seek(1));
    assert!(!iterator.seek(2), "phrase start too far from the prefix");
    assert!(iterator.is_at_end(), "doc 3 has no phrase occurrence");
}

#[test]
fn test_unknown_field_acts_empty() {
    let mut context = FakeSearchContext::default();
    context.add_idx(0).idx(0).add_result(
        UNKNOWN_FIELD,
        STRING_TERM,
        FakeResult::new().doc(4).pos(3).len(50).doc(5).pos(2).len(50),
    );

    let mut node = single_term(STRING_TERM, UNKNOWN_FIELD, STRING_ID, STRING_WEIGHT);
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let terms = extract_terms(&node);
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0].num_fields(), 0);

    let (mut iterator, _) = get_iterator(&mut node, &context);
    assert!(!iterator.seek(1));
    assert!(iterator.is_at_end());
}

#[test]
fn test_illegal_fields_are_ignored() {
    let mut node = single_term(STRING_TERM, UNKNOWN_FIELD, STRING_ID, STRING_WEIGHT);
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let context = FakeSearchContext::default();
    let layout = reserve(&mut node);
    build(&mut node, &context);

    assert_eq!(node.as_term().unwrap().data().num_fields(), 0);
    assert_eq!(layout.create_match_data().num_term_fields(), 0);
}

#[test]
fn test_query_glues_everything_together() {
    let stack_dump = stack_dump::create(&single_term(STRING_TERM, FIELD, 1, Weight::new(2))).unwrap();

    let mut query = Query::new();
    query
        .build_tree(&stack_dump, "", &ViewResolver::new(), &plain_index_env())
        .unwrap();
    assert_eq!(query.extract_terms().unwrap().len(), 1);

    let mut context = FakeSearchContext::default();
    context.set_limit(42);
    let mut layout = MatchDataLayout::new();
    query
        .reserve_handles(&RequestContext::default(), &context, &mut layout)
        .unwrap();
    let md = layout.create_match_data();
    assert_eq!(md.num_term_fields(), 1);

    query.optimize().unwrap();
    query.fetch_postings().unwrap();
    assert!(query.create_search(&md).is_ok());
}

fn check_query_adds_location(location_spec: &str) {
    let loc_field = "location";
    let env = SimpleIndexEnvironment::new()
        .with_field(FieldInfo::new(FieldType::Index, CollectionType::Single, FIELD, 0))
        .with_field(FieldInfo::new(
            FieldType::Attribute,
            CollectionType::Single,
            "location_zcurve",
            1,
        ));
    let stack_dump = stack_dump::create(&single_term(STRING_TERM, FIELD, 1, Weight::new(2))).unwrap();

    let mut query = Query::new();
    query
        .build_tree(
            &stack_dump,
            &format!("{loc_field}:{location_spec}"),
            &ViewResolver::new(),
            &env,
        )
        .unwrap();
    assert_eq!(query.extract_terms().unwrap().len(), 1);

    let mut context = FakeSearchContext::default();
    context.add_idx(0).set_limit(42);
    let mut layout = MatchDataLayout::new();
    query
        .reserve_handles(&RequestContext::default(), &context, &mut layout)
        .unwrap();
    let md = layout.create_match_data();
    assert_eq!(md.num_term_fields(), 2);

    query.fetch_postings().unwrap();
    let search = query.create_search(&md).unwrap();
    assert!(
        search.as_string().contains(location_spec),
        "search (missing location): {}",
        search.as_string()
    );
}

#[test]
fn test_query_adds_location() {
    check_query_adds_location("(2,10,10,3,0,1,0,0)");
}

#[test]
fn test_query_adds_location_cutoff() {
    check_query_adds_location("[2,10,10,20,20]");
}

#[test]
fn test_location_adds_exactly_one_term_field() {
    let env = SimpleIndexEnvironment::new()
        .with_field(FieldInfo::new(FieldType::Index, CollectionType::Single, FIELD, 0))
        .with_field(FieldInfo::new(FieldType::Attribute, CollectionType::Single, "pos_zcurve", 1));
    let stack_dump = stack_dump::create(&build_query_tree(&ViewResolver::new(), &env)).unwrap();
    let context = FakeSearchContext::new(10);

    let reserved = |location: &str| {
        let mut query = Query::new();
        query
            .build_tree(&stack_dump, location, &ViewResolver::new(), &env)
            .unwrap();
        let mut layout = MatchDataLayout::new();
        query
            .reserve_handles(&RequestContext::default(), &context, &mut layout)
            .unwrap();
        layout.num_term_fields()
    };
    assert_eq!(reserved("pos:(2,0,0,5)"), reserved("") + 1);
}

#[test]
fn test_fake_field_search_dumps_differ() {
    let mut layout = MatchDataLayout::new();
    let handle = layout.alloc_term_field(0);
    let md = layout.create_match_data();

    let mut a = FakeSearchable::new();
    a.set_tag("a");
    let mut b = FakeSearchable::new();
    b.set_tag("b");
    let field1 = FieldSpec::new("field1", 0, handle);
    let field2 = FieldSpec::new("field2", 0, handle);

    let dump = |searchable: &FakeSearchable, field: &FieldSpec, term: &str| {
        searchable
            .create_blueprint(field, &QueryTerm::new(term, TermMatch::Word))
            .unwrap()
            .fetch_postings(true)
            .unwrap()
            .create_search(&md)
            .unwrap()
            .as_string()
    };
    let s1 = dump(&a, &field1, "term1");
    assert_ne!(s1, dump(&a, &field1, "term2"));
    assert_ne!(s1, dump(&a, &field2, "term1"));
    assert_ne!(s1, dump(&b, &field1, "term1"));
}

#[test]
fn test_no_docs_give_zero_doc_frequency() {
    let mut node = single_term(STRING_TERM, FIELD, STRING_ID, STRING_WEIGHT);
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());
    let mut context = FakeSearchContext::default();
    context.set_limit(0);

    reserve(&mut node);
    build(&mut node, &context);

    let data = node.as_term().unwrap().data();
    assert_eq!(data.num_fields(), 1);
    assert_eq!(data.field(0).doc_freq(), 0.0);
}

#[test]
fn test_weak_and_blueprints_are_created_correctly() {
    let mut builder = QueryBuilder::new();
    builder.add_weak_and(2, 123, "view").unwrap();
    builder.add_string_term("foo", FIELD, 0, Weight::new(3)).unwrap();
    builder.add_string_term("bar", FIELD, 0, Weight::new(7)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &plain_index_env());

    let mut context = FakeSearchContext::default();
    context
        .add_idx(0)
        .idx(0)
        .add_result(FIELD, "foo", FakeResult::new().doc(1).doc(3))
        .add_result(FIELD, "bar", FakeResult::new().doc(2).doc(3).doc(4));

    reserve(&mut node);
    let blueprint = build(&mut node, &context);
    let Blueprint::WeakAnd(wand) = &blueprint else {
        panic!("expected weak and, got {}", blueprint.as_string());
    };
    assert_eq!(wand.weights().len(), 2);
    assert_eq!(wand.child_count(), 2);
    assert_eq!(wand.n(), 123);
    assert_eq!(wand.weights(), &[3, 7]);
    assert_eq!(wand.child(0).estimate().est_hits(), 2);
    assert_eq!(wand.child(1).estimate().est_hits(), 3);
}

#[test]
fn test_parallel_wand_blueprints_are_created_correctly() {
    let mut builder = QueryBuilder::new();
    builder
        .add_wand_term(2, FIELD, 42, Weight::new(100), 123, 9000, 1.25)
        .unwrap();
    builder.add_string_term("foo", FIELD, 0, Weight::new(3)).unwrap();
    builder.add_string_term("bar", FIELD, 0, Weight::new(7)).unwrap();
    let mut node = builder.build().unwrap();
    resolve_views(&mut node, &ViewResolver::new(), &attribute_index_env());

    let mut context = FakeSearchContext::default();
    context.set_limit(1000);
    context
        .add_idx(0)
        .idx(0)
        .add_result(FIELD, "foo", FakeResult::new().doc(1).doc(3))
        .add_result(FIELD, "bar", FakeResult::new().doc(2).doc(3).doc(4));

    reserve(&mut node);
    let blueprint = build(&mut node, &context);
    let Blueprint::ParallelWeakAnd(wand) = &blueprint else {
        panic!("expected parallel weak and, got {}", blueprint.as_string());
    };
    assert_eq!(wand.score_threshold(), 9000);
    assert_eq!(wand.threshold_boost_factor(), 1.25);
    assert_eq!(wand.docid_limit(), 1000);
    assert_eq!(wand.scores_to_track(), 123);
    assert_eq!(wand.weights(), &[3, 7]);
}

#[test]
fn test_black_list_blueprint_can_be_used() {
    let stack_dump = stack_dump::create(&single_term("foo", FIELD, FIELD_ID, STRING_WEIGHT)).unwrap();

    let mut query = Query::new();
    query
        .build_tree(&stack_dump, "", &ViewResolver::new(), &plain_index_env())
        .unwrap();

    let mut context = FakeSearchContext::new(42);
    context.add_idx(0).idx(0).add_result(
        FIELD,
        "foo",
        FakeResult::new().doc(1).doc(3).doc(5).doc(7).doc(9).doc(11),
    );
    context.set_limit(42);

    let mut blacklist = SimpleResult::new();
    blacklist.add_hit(3).add_hit(9);
    query
        .set_blacklist_blueprint(Blueprint::leaf(SimpleBlueprint::new(blacklist)))
        .unwrap();

    let mut layout = MatchDataLayout::new();
    query
        .reserve_handles(&RequestContext::default(), &context, &mut layout)
        .unwrap();
    let md = layout.create_match_data();

    query.optimize().unwrap();
    query.fetch_postings().unwrap();
    let mut search = query.create_search(&md).unwrap();
    let mut actual = SimpleResult::new();
    actual.search(search.as_mut());
    assert_eq!(actual, [1, 5, 7, 11].into_iter().collect::<SimpleResult>());
}

#[test]
fn test_foreign_match_data_is_rejected() {
    let stack_dump = stack_dump::create(&single_term("foo", FIELD, 1, Weight::default())).unwrap();
    let mut query = Query::new();
    query
        .build_tree(&stack_dump, "", &ViewResolver::new(), &plain_index_env())
        .unwrap();
    let mut context = FakeSearchContext::new(10);
    context
        .add_idx(0)
        .idx(0)
        .add_result(FIELD, "foo", FakeResult::new().doc(1));
    let mut layout = MatchDataLayout::new();
    query
        .reserve_handles(&RequestContext::default(), &context, &mut layout)
        .unwrap();
    query.fetch_postings().unwrap();

    let mut other = MatchDataLayout::new();
    other.alloc_term_field(FIELD_ID);
    let err = query.create_search(&other.create_match_data()).err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::ForeignHandle { .. }));
}

#[test]
fn test_resolving_a_single_term() {
    let mut term = Term::new(TermKind::String(STRING_TERM.into()), FIELD, 1, Weight::default());
    resolve_term(&mut term, &view_resolver(), &resolved_index_env());
    assert_eq!(term.data().num_fields(), 2);
    let mut layout = MatchDataLayout::new();
    reserve_term(&mut term, &mut layout);
    assert_eq!(layout.num_term_fields(), 2);
}

/// Random query trees over a handful of views, some unknown and some fanning
/// out to two fields.
fn random_tree(rng: &mut fastrand::Rng, builder: &mut QueryBuilder, depth: u32, next_id: &mut u32) {
    const VIEWS: [&str; 4] = [FIELD, "both", UNKNOWN_FIELD, RESOLVED_FIELD2];
    *next_id += 1;
    let id = *next_id;
    let view = VIEWS[rng.usize(..VIEWS.len())];
    let choice = if depth == 0 { rng.u32(5..7) } else { rng.u32(0..7) };
    match choice {
        0 | 1 | 2 => {
            let arity = rng.usize(1..4);
            match choice {
                0 => builder.add_and(arity).unwrap(),
                1 => builder.add_or(arity).unwrap(),
                _ => builder.add_near(arity, rng.u32(1..5)).unwrap(),
            }
            for _ in 0..arity {
                random_tree(rng, builder, depth - 1, next_id);
            }
        }
        3 => {
            let arity = rng.usize(1..4);
            builder.add_phrase(arity, view, id, Weight::default()).unwrap();
            for i in 0..arity {
                builder
                    .add_string_term(format!("w{i}"), view, id, Weight::default())
                    .unwrap();
            }
        }
        4 => {
            let arity = rng.usize(1..4);
            builder.add_weighted_set_term(arity, view, id, Weight::default()).unwrap();
            for i in 0..arity {
                builder
                    .add_string_term(format!("t{i}"), view, id, Weight::new(i as i32 + 1))
                    .unwrap();
            }
        }
        _ => {
            builder
                .add_string_term(format!("s{id}"), view, id, Weight::default())
                .unwrap();
        }
    }
}

#[test]
fn test_reserved_handles_match_resolved_fields() {
    let env = SimpleIndexEnvironment::new()
        .with_field(FieldInfo::new(FieldType::Index, CollectionType::Single, FIELD, 1))
        .with_field(FieldInfo::new(FieldType::Index, CollectionType::Single, RESOLVED_FIELD1, 2))
        .with_field(FieldInfo::new(FieldType::Index, CollectionType::Single, RESOLVED_FIELD2, 3));
    let mut resolver = ViewResolver::new();
    resolver.add("both", RESOLVED_FIELD1).add("both", RESOLVED_FIELD2);

    let mut rng = fastrand::Rng::with_seed(2985745485);
    for _ in 0..200 {
        let mut builder = QueryBuilder::new();
        let mut next_id = 0;
        random_tree(&mut rng, &mut builder, 3, &mut next_id);
        let mut node = builder.build().unwrap();
        resolve_views(&mut node, &resolver, &env);

        let expected: usize = extract_terms(&node).iter().map(|t| t.num_fields()).sum();
        let layout = reserve(&mut node);
        assert_eq!(layout.create_match_data().num_term_fields(), expected);

        let mut handles = Vec::new();
        node.for_each_term(&mut |term| {
            handles.extend(term.data().fields().iter().map(|f| f.handle().unwrap()));
            for child in term.children() {
                assert!(child.data().fields().iter().all(|f| f.handle().is_none()));
            }
        });
        assert!(handles.iter().all(|&h| layout.owns(h)));
        handles.sort_by_key(|h| h.slot());
        handles.dedup();
        assert_eq!(handles.len(), expected);
    }
}

/// Documents matched by `node` under plain boolean semantics, where a term
/// matches the documents registered for it.
fn expected_docs(node: &Node, postings: &[BTreeSet<u32>]) -> BTreeSet<u32> {
    match node {
        Node::Term(term) => postings[term.data().unique_id() as usize].clone(),
        Node::And(children) => children
            .iter()
            .map(|c| expected_docs(c, postings))
            .reduce(|a, b| a.intersection(&b).copied().collect())
            .unwrap_or_default(),
        Node::Or(children) => children
            .iter()
            .flat_map(|c| expected_docs(c, postings))
            .collect(),
        Node::AndNot(children) => {
            let mut iter = children.iter().map(|c| expected_docs(c, postings));
            let first = iter.next().unwrap_or_default();
            iter.fold(first, |a, b| a.difference(&b).copied().collect())
        }
        other => panic!("unexpected node {other:?}"),
    }
}

fn random_boolean_tree(rng: &mut fastrand::Rng, builder: &mut QueryBuilder, depth: u32, terms: &mut u32) {
    if depth == 0 || rng.u8(0..3) == 0 {
        let id = *terms;
        *terms += 1;
        builder
            .add_string_term(format!("t{id}"), FIELD, id, Weight::default())
            .unwrap();
        return;
    }
    let arity = rng.usize(1..4);
    match rng.u8(0..3) {
        0 => builder.add_and(arity).unwrap(),
        1 => builder.add_or(arity).unwrap(),
        _ => builder.add_and_not(arity).unwrap(),
    }
    for _ in 0..arity {
        random_boolean_tree(rng, builder, depth - 1, terms);
    }
}

#[test]
fn test_query_matches_boolean_semantics() {
    let mut rng = fastrand::Rng::with_seed(0x7e55e7a);
    for round in 0..100 {
        let mut builder = QueryBuilder::new();
        let mut terms = 0;
        random_boolean_tree(&mut rng, &mut builder, 3, &mut terms);
        let node = builder.build().unwrap();

        let postings = (0..terms)
            .map(|_| {
                if rng.u8(0..5) == 0 {
                    BTreeSet::new()
                } else {
                    (1..60u32).filter(|_| rng.u8(0..3) == 0).collect()
                }
            })
            .collect::<Vec<BTreeSet<u32>>>();
        let mut context = FakeSearchContext::new(64);
        context.add_idx(0);
        for (id, docs) in postings.iter().enumerate() {
            let result = docs.iter().fold(FakeResult::new(), |r, &d| r.doc(d).pos(0));
            context.idx(0).add_result(FIELD, format!("t{id}"), result);
        }
        let expected = expected_docs(&node, &postings);
        let stack_dump = stack_dump::create(&node).unwrap();

        for optimize in [false, true] {
            let mut query = Query::new();
            query
                .build_tree(&stack_dump, "", &ViewResolver::new(), &plain_index_env())
                .unwrap();
            let mut layout = MatchDataLayout::new();
            query
                .reserve_handles(&RequestContext::new(format!("round {round}"), Default::default()), &context, &mut layout)
                .unwrap();
            if optimize {
                query.optimize().unwrap();
            }
            query.fetch_postings().unwrap();
            let md = layout.create_match_data();
            let mut search = query.create_search(&md).unwrap();
            let mut actual = SimpleResult::new();
            actual.search(search.as_mut());
            assert_eq!(
                actual.hits(),
                expected.iter().copied().collect::<Vec<_>>().as_slice(),
                "round {round}, optimize {optimize}"
            );
        }
    }
}
