// crates/stoney-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and placeholder substitution for the CLI.
// Purpose: Centralize user-facing strings.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! All console output of the `stoney` binary is routed through the
//! [`t!`](crate::t) macro. The catalog is English only.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself.
//! - Placeholders are substituted in argument order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
///
/// # Invariants
/// - `key` matches a placeholder name without braces (for example, `path`).
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates.
    pub key: &'static str,
    /// The formatted value substituted for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// English catalog entries.
const CATALOG_EN: &[(&str, &str)] = &[
    ("main.version", "stoney {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("config.load_failed", "Configuration error: {error}"),
    ("parse.load_failed", "Failed to load suite {path}: {error}"),
    ("parse.serialize_failed", "Failed to serialize suite: {error}"),
    ("run.no_source", "Nothing to run: pass --suite <GLOB> and/or --issue <KEY>."),
    ("run.glob_invalid", "Invalid suite pattern {pattern}: {error}"),
    ("run.glob_read_failed", "Failed to read suite path: {error}"),
    ("run.no_suites", "No suite files matched {pattern} and no issue keys were given."),
    ("run.suite_load_failed", "Failed to load suite {path}: {error}"),
    ("run.issue_load_failed", "Failed to load suite from issue {key}: {error}"),
    (
        "run.base_url_required",
        "A base URL is required because the selected scenarios contain HTTP steps. Pass \
         --base-url or set {env}.",
    ),
    (
        "run.events_path_required",
        "The file event sink needs a path. Pass --events-path or set events.path.",
    ),
    ("run.events_open_failed", "Failed to open event file {path}: {error}"),
    ("run.runner_failed", "Failed to initialize runners: {error}"),
    ("run.header", "Running {suites} suite(s) against {base_url}"),
    ("run.base_url.none", "(no base URL)"),
    ("run.scenario.pass", "PASS  {suite} / {contract} / {id}{status}"),
    ("run.scenario.fail", "FAIL  {suite} / {contract} / {id}{status}"),
    ("run.scenario.status", " [{status}]"),
    ("run.scenario.note", "      - {note}"),
    ("run.interrupt", "Interrupt received, cancelling run."),
    ("run.cancelled", "Run cancelled; remaining scenarios were not started."),
    ("run.summary", "{passed} passed, {failed} failed, {total} total"),
    ("run.report.serialize_failed", "Failed to serialize report: {error}"),
    ("run.report.write_failed", "Failed to write report {path}: {error}"),
    ("run.report.written", "Report written: {path}"),
];

/// Returns the catalog map.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_EN_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CATALOG_EN_MAP.get_or_init(|| CATALOG_EN.iter().copied().collect())
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Looks up `key` and substitutes `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}
