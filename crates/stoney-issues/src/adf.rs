// crates/stoney-issues/src/adf.rs
// ============================================================================
// Module: Rich-Text Rendering
// Description: Flattens issue description node trees and finds suite fences.
// Purpose: Recover fenced suite text from a structured issue description.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! Issue descriptions arrive as a tree of typed nodes (`{type, text?,
//! attrs?, content?}`). [`render_adf`] walks the tree depth-first: `text`
//! nodes contribute their text verbatim and `codeBlock` nodes contribute a
//! triple-backtick fence tagged with their declared language around their
//! concatenated child text. Code-block children are rendered only inside
//! their fence. [`extract_suite_fence`] then finds the first fence tagged
//! `stoney`, `yaml`, or `yml` (case-insensitive).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a node tree into one text blob.
#[must_use]
pub fn render_adf(node: &Value) -> String {
    let mut out = String::new();
    render_node(node, &mut out);
    out
}

/// Appends the rendering of `node` to `out`.
fn render_node(node: &Value, out: &mut String) {
    let Value::Object(map) = node else {
        return;
    };
    let children = map.get("content").and_then(Value::as_array);
    match map.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("codeBlock") => {
            let language = map
                .get("attrs")
                .and_then(|attrs| attrs.get("language"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            out.push_str("\n```");
            out.push_str(language);
            out.push('\n');
            for child in children.into_iter().flatten() {
                if child.get("type").and_then(Value::as_str) == Some("text")
                    && let Some(text) = child.get("text").and_then(Value::as_str)
                {
                    out.push_str(text);
                }
            }
            out.push_str("\n```\n");
            return;
        }
        _ => {}
    }
    for child in children.into_iter().flatten() {
        render_node(child, out);
    }
}

// ============================================================================
// SECTION: Fence Extraction
// ============================================================================

/// Returns the compiled fence pattern.
fn fence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)```(stoney|yaml|yml)\s*\n(.*?)\n```").ok()).as_ref()
}

/// Returns the trimmed body of the first suite-tagged fence.
#[must_use]
pub fn extract_suite_fence(text: &str) -> Option<String> {
    fence_pattern()?
        .captures(text)
        .and_then(|caps| caps.get(2))
        .map(|body| body.as_str().trim().to_string())
}
