// crates/stoney-core/src/model.rs
// ============================================================================
// Module: Suite Model
// Description: Strongly typed suite, contract, scenario, and step definitions.
// Purpose: Represent validated suite documents for the runners.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These types are only constructed by [`crate::loader`] after validation and
//! are never mutated afterwards. They serialize back into the canonical suite
//! grammar (multi-step form only), which is what `stoney parse` prints.
//!
//! Invariants:
//! - Every [`Scenario`] holds at least one [`Step`].
//! - A [`Step`] is exactly one of Http, Exec, or Sql by construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Suite Structure
// ============================================================================

/// Top-level versioned suite document.
///
/// # Invariants
/// - `version` equals [`crate::SUPPORTED_VERSION`].
/// - `contracts` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteDocument {
    /// Schema version of the document.
    pub version: u64,
    /// Suite display name.
    #[serde(rename = "suite")]
    pub suite_name: String,
    /// Contracts in declaration order.
    pub contracts: Vec<Contract>,
}

/// Named group of scenarios covering one behavior area.
///
/// # Invariants
/// - `name` is non-empty.
/// - `scenarios` is non-empty and scenario ids are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    /// Contract name.
    pub name: String,
    /// Scenarios in declaration order.
    pub scenarios: Vec<Scenario>,
}

/// Ordered list of steps exercising one end-to-end behavior.
///
/// # Invariants
/// - `id` is non-empty and unique within the parent contract.
/// - `steps` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    /// Scenario identifier.
    pub id: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Returns true when any step issues an HTTP request.
    #[must_use]
    pub fn has_http_step(&self) -> bool {
        self.steps.iter().any(|step| step.kind() == StepKind::Http)
    }
}

// ============================================================================
// SECTION: Steps
// ============================================================================

/// Step kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// HTTP request against the target base URL.
    Http,
    /// Local shell command.
    Exec,
    /// Database query.
    Sql,
}

impl StepKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Exec => "exec",
            Self::Sql => "sql",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action paired with its optional expectation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Step {
    /// HTTP request step.
    Http {
        /// Request definition.
        http: HttpStep,
        /// Optional response expectation.
        #[serde(skip_serializing_if = "Option::is_none")]
        expect: Option<HttpExpectation>,
    },
    /// Shell command step.
    Exec {
        /// Command definition.
        exec: ExecStep,
        /// Optional process outcome expectation.
        #[serde(skip_serializing_if = "Option::is_none")]
        expect: Option<ExecExpectation>,
    },
    /// Database query step.
    Sql {
        /// Query definition.
        sql: SqlStep,
        /// Optional query outcome expectation.
        #[serde(skip_serializing_if = "Option::is_none")]
        expect: Option<SqlExpectation>,
    },
}

impl Step {
    /// Returns the kind tag of this step.
    #[must_use]
    pub const fn kind(&self) -> StepKind {
        match self {
            Self::Http {
                ..
            } => StepKind::Http,
            Self::Exec {
                ..
            } => StepKind::Exec,
            Self::Sql {
                ..
            } => StepKind::Sql,
        }
    }

    /// Returns the human-readable title used in results and events.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Http {
                http, ..
            } => format!("http {} {}", http.method, http.path),
            Self::Exec {
                exec, ..
            } => format!("exec {}", exec.run),
            Self::Sql {
                sql, ..
            } => format!("sql {} ({})", sql.driver, sql.url_env),
        }
    }
}

/// HTTP request definition.
///
/// # Invariants
/// - `method` is an upper-case HTTP token.
/// - `path` starts with `/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpStep {
    /// Request method.
    pub method: String,
    /// Request path joined onto the base URL.
    pub path: String,
    /// Request headers.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Query parameters.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// Raw string body or structured body to JSON-encode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-attempt timeout override in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Retry count override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// Shell command definition.
///
/// # Invariants
/// - `run` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecStep {
    /// Command line passed to the shell.
    pub run: String,
    /// Working directory, relative to the runner's working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Environment overrides merged over the process environment.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Per-attempt timeout override in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Retry count override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDriver {
    /// `PostgreSQL` wire protocol.
    Postgres,
}

impl SqlDriver {
    /// Parses a driver tag.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for SqlDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// Database query definition.
///
/// # Invariants
/// - `url_env` names an environment variable; the connection string itself
///   never appears in the suite.
/// - `query` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStep {
    /// Driver tag.
    pub driver: SqlDriver,
    /// Name of the environment variable holding the connection string.
    pub url_env: String,
    /// Query text.
    pub query: String,
    /// Per-attempt timeout override in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Retry count override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Expected HTTP outcome. Every populated field is checked independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpExpectation {
    /// Exact status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Deep-subset pattern for the decoded JSON body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Substring expected in the raw body.
    #[serde(rename = "bodyContains", skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,
}

/// Expected process outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecExpectation {
    /// Expected exit code (0 when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Substring expected in standard output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_contains: Option<String>,
    /// Substring expected in standard error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_contains: Option<String>,
}

/// Expected query outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlExpectation {
    /// Expected row count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    /// Deep-subset pattern for the first returned row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}
