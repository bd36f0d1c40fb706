// crates/stoney-issues/src/lib.rs
// ============================================================================
// Module: Stoney Issues
// Description: Suites embedded in issue tracker descriptions.
// Purpose: Load a suite from an issue key instead of a file.
// Dependencies: regex, reqwest, serde_json, stoney-core, thiserror, url
// ============================================================================

//! ## Overview
//! An issue's description is fetched, flattened to text, and searched for the
//! first fenced block tagged `stoney`, `yaml`, or `yml`. The fence body is
//! loaded with the same grammar and validation as a suite file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adf;
pub mod client;

// ============================================================================
// SECTION: Imports
// ============================================================================

use stoney_core::EnvLookup;
use stoney_core::SchemaError;
use stoney_core::SuiteDocument;
use stoney_core::SuiteFormat;
use stoney_core::load_suite_str;
use thiserror::Error;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adf::extract_suite_fence;
pub use adf::render_adf;
pub use client::Issue;
pub use client::IssueClient;
pub use client::IssueTrackerConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Issue-sourced suite errors.
#[derive(Debug, Error)]
pub enum IssueError {
    /// Connection settings are incomplete.
    #[error("missing {0} (required to load a suite from an issue)")]
    MissingConfig(String),
    /// The issue could not be fetched.
    #[error("{0}")]
    Fetch(String),
    /// The issue response was not valid JSON.
    #[error("issue response parse error: {0}")]
    Parse(String),
    /// No suite fence was found in the description.
    #[error("no ```stoney / ```yaml fenced code block found in issue {key} ({summary})")]
    NoFence {
        /// Issue key.
        key: String,
        /// Issue summary.
        summary: String,
    },
    /// The fenced suite failed to load.
    #[error("issue {key}: {source}")]
    Schema {
        /// Issue key.
        key: String,
        /// Underlying suite error.
        source: SchemaError,
    },
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Extracts and validates the suite embedded in a fetched issue.
///
/// # Errors
///
/// Returns [`IssueError::NoFence`] or [`IssueError::Schema`].
pub fn suite_from_issue(issue: &Issue, env: &dyn EnvLookup) -> Result<SuiteDocument, IssueError> {
    let text = render_adf(&issue.description);
    let fenced = extract_suite_fence(&text).ok_or_else(|| IssueError::NoFence {
        key: issue.key.clone(),
        summary: issue.summary.clone(),
    })?;
    load_suite_str(&fenced, SuiteFormat::Yaml, env).map_err(|source| IssueError::Schema {
        key: issue.key.clone(),
        source,
    })
}

/// Fetches an issue and loads its embedded suite.
///
/// # Errors
///
/// Returns [`IssueError`] when fetching, extraction, or validation fails.
pub async fn load_suite_from_issue(
    client: &IssueClient,
    key: &str,
    env: &dyn EnvLookup,
) -> Result<SuiteDocument, IssueError> {
    let issue = client.fetch_issue(key).await?;
    suite_from_issue(&issue, env)
}
