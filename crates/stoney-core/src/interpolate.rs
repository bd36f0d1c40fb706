// crates/stoney-core/src/interpolate.rs
// ============================================================================
// Module: Environment Interpolation
// Description: `${NAME}` substitution over arbitrary JSON values.
// Purpose: Resolve suite placeholders against an injected environment.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! Strings have every `${NAME}` replaced by the value of `NAME`; arrays and
//! objects are rewritten element-wise; other values pass through.
//!
//! A missing variable resolves to the empty string. An unset auth token then
//! shows up as a real authentication failure against the target instead of a
//! skipped step.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Captures;
use regex::Regex;
use serde_json::Map;
use serde_json::Value;

use crate::env::EnvLookup;

// ============================================================================
// SECTION: Placeholder Grammar
// ============================================================================

/// Returns the compiled placeholder pattern.
fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Z0-9_]+)\}").ok()).as_ref()
}

// ============================================================================
// SECTION: Interpolation
// ============================================================================

/// Substitutes placeholders inside a single string.
#[must_use]
pub fn interpolate_str(input: &str, env: &dyn EnvLookup) -> String {
    let Some(pattern) = placeholder_pattern() else {
        return input.to_string();
    };
    match pattern.replace_all(input, |caps: &Captures<'_>| env.var(&caps[1]).unwrap_or_default()) {
        Cow::Borrowed(unchanged) => unchanged.to_string(),
        Cow::Owned(replaced) => replaced,
    }
}

/// Recursively substitutes placeholders inside `value`.
#[must_use]
pub fn interpolate(value: &Value, env: &dyn EnvLookup) -> Value {
    match value {
        Value::String(text) => Value::String(interpolate_str(text, env)),
        Value::Array(items) => Value::Array(items.iter().map(|item| interpolate(item, env)).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), interpolate(item, env));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
