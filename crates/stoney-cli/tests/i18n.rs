// crates/stoney-cli/tests/i18n.rs
// ============================================================================
// Module: CLI Catalog Tests
// Description: Exercises the message catalog and placeholder substitution.
// Purpose: Ensure CLI strings route through stable catalog helpers.
// Dependencies: stoney-cli i18n module and the `t!` macro.
// ============================================================================

//! ## Overview
//! - Message arguments capture key/value substitutions.
//! - Translation falls back to keys on misses.
//! - The [`t!`](stoney_cli::t) macro formats placeholders.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use stoney_cli::i18n::MessageArg;
use stoney_cli::i18n::translate;
use stoney_cli::t;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn message_arg_new_captures_key_and_value() {
    let arg = MessageArg::new("path", "stoney-report.json");
    assert_eq!(arg.key, "path");
    assert_eq!(arg.value, "stoney-report.json");
}

#[test]
fn translate_substitutes_placeholders() {
    let args = vec![MessageArg::new("path", "out/report.json")];
    assert_eq!(translate("run.report.written", args), "Report written: out/report.json");
}

#[test]
fn translate_falls_back_to_key() {
    assert_eq!(translate("missing.key", Vec::new()), "missing.key");
}

#[test]
fn macro_formats_multiple_placeholders() {
    let line = t!("run.summary", passed = 3, failed = 1, total = 4);
    assert_eq!(line, "3 passed, 1 failed, 4 total");
}
