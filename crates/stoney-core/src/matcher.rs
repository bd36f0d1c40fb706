// crates/stoney-core/src/matcher.rs
// ============================================================================
// Module: Expectation Matcher
// Description: One-directional deep-subset comparison of JSON values.
// Purpose: Let expectations assert only the fields they care about.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `deep_subset_match(actual, expected)` holds when every field and position
//! present in `expected` is present and matching in `actual`:
//! - scalars (including null) match by value; numbers compare numerically,
//! - arrays match positionally over `expected`'s length; extra trailing
//!   elements in `actual` are ignored,
//! - objects match when every expected key exists in `actual` with a
//!   recursively matching value; extra keys are ignored,
//! - a type-category mismatch never matches.
//!
//! The relation is reflexive and not symmetric.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Number;
use serde_json::Value;

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Returns true when `actual` contains everything `expected` describes.
#[must_use]
pub fn deep_subset_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, want)| {
            actual.get(key).is_some_and(|have| deep_subset_match(have, want))
        }),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() >= expected.len()
                && expected.iter().zip(actual).all(|(want, have)| deep_subset_match(have, want))
        }
        (Value::Number(actual), Value::Number(expected)) => numbers_equal(actual, expected),
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => false,
        (actual, expected) => actual == expected,
    }
}

/// Compares numbers by value regardless of integer/float representation.
#[allow(clippy::float_cmp, reason = "Expectations assert exact decoded values.")]
fn numbers_equal(actual: &Number, expected: &Number) -> bool {
    if let (Some(left), Some(right)) = (actual.as_i64(), expected.as_i64()) {
        return left == right;
    }
    if let (Some(left), Some(right)) = (actual.as_u64(), expected.as_u64()) {
        return left == right;
    }
    match (actual.as_f64(), expected.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
