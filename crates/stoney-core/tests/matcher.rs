// crates/stoney-core/tests/matcher.rs
// ============================================================================
// Module: Deep Subset Matcher Tests
// Description: Example and property tests for the expectation matcher.
// Purpose: Pin reflexivity, asymmetry, and positional array semantics.
// ============================================================================

//! Matcher tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;
use stoney_core::deep_subset_match;

fn json_value_strategy(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        any::<f64>()
            .prop_filter("finite", |v| v.is_finite())
            .prop_map(|v| { serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number) }),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0 .. 4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0 .. 4).prop_map(|map| {
                Value::Object(map.into_iter().collect())
            }),
        ]
    })
}

#[test]
fn object_subset_is_one_directional() {
    assert!(deep_subset_match(&json!({"a": 1, "b": 2}), &json!({"a": 1})));
    assert!(!deep_subset_match(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
}

#[test]
fn array_subset_is_positional_prefix() {
    assert!(deep_subset_match(&json!([1, 2, 3]), &json!([1, 2])));
    assert!(!deep_subset_match(&json!([1, 2]), &json!([1, 2, 3])));
    assert!(!deep_subset_match(&json!([2, 1, 3]), &json!([1, 2])));
}

#[test]
fn nested_patterns_match_recursively() {
    let actual = json!({
        "user": {"id": 7, "roles": ["admin", "ops"], "email": "a@b.c"},
        "meta": {"page": 1}
    });
    assert!(deep_subset_match(&actual, &json!({"user": {"roles": ["admin"]}})));
    assert!(!deep_subset_match(&actual, &json!({"user": {"roles": ["ops"]}})));
    assert!(!deep_subset_match(&actual, &json!({"user": {"missing": null}})));
}

#[test]
fn type_category_mismatch_never_matches() {
    assert!(!deep_subset_match(&json!([]), &json!({})));
    assert!(!deep_subset_match(&json!({}), &json!([])));
    assert!(!deep_subset_match(&json!("1"), &json!(1)));
    assert!(!deep_subset_match(&json!(null), &json!({})));
    assert!(!deep_subset_match(&json!({"a": 1}), &json!(null)));
}

#[test]
fn null_expected_requires_null_actual() {
    assert!(deep_subset_match(&json!({"a": null}), &json!({"a": null})));
    assert!(!deep_subset_match(&json!({"a": 0}), &json!({"a": null})));
}

#[test]
fn numbers_compare_by_value() {
    assert!(deep_subset_match(&json!(1.0), &json!(1)));
    assert!(deep_subset_match(&json!(1), &json!(1.0)));
    assert!(!deep_subset_match(&json!(1.5), &json!(1)));
    assert!(deep_subset_match(&json!(u64::MAX), &json!(u64::MAX)));
}

#[test]
fn empty_patterns_match_same_category() {
    assert!(deep_subset_match(&json!({"a": 1}), &json!({})));
    assert!(deep_subset_match(&json!([1]), &json!([])));
}

proptest! {
    #[test]
    fn match_is_reflexive(value in json_value_strategy(3)) {
        prop_assert!(deep_subset_match(&value, &value));
    }

    #[test]
    fn extra_keys_in_actual_are_ignored(
        value in json_value_strategy(2),
        extra in json_value_strategy(1),
    ) {
        let expected = json!({"kept": value.clone()});
        let actual = json!({"kept": value, "zz_extra": extra});
        prop_assert!(deep_subset_match(&actual, &expected));
    }

    #[test]
    fn trailing_elements_in_actual_are_ignored(
        items in prop::collection::vec(json_value_strategy(1), 0 .. 5),
        extra in json_value_strategy(1),
    ) {
        let expected = Value::Array(items.clone());
        let mut longer = items;
        longer.push(extra);
        prop_assert!(deep_subset_match(&Value::Array(longer), &expected));
    }
}
