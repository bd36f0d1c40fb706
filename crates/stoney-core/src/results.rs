// crates/stoney-core/src/results.rs
// ============================================================================
// Module: Result Records
// Description: Immutable step and scenario outcome records.
// Purpose: Carry runner outcomes into the report without revision.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Runners produce exactly one [`StepResult`] per executed step, and the
//! orchestrator folds a scenario's step results into one [`ScenarioResult`].
//! Neither is modified after construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::model::StepKind;

// ============================================================================
// SECTION: Step Results
// ============================================================================

/// Outcome of one executed step.
///
/// # Invariants
/// - `ok` is false whenever `notes` describes a failure.
/// - `method`, `url`, and `status` are only set for HTTP steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Whether the step completed and satisfied its expectation.
    pub ok: bool,
    /// Step kind.
    pub kind: StepKind,
    /// Display title of the step.
    pub title: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// One note per failed check or the last execution error.
    pub notes: Vec<String>,
    /// HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Fully resolved request URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP response status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Process exit code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Rows returned or affected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

impl StepResult {
    /// Creates a passing result with no kind-specific fields.
    #[must_use]
    pub fn new(kind: StepKind, title: impl Into<String>) -> Self {
        Self {
            ok: true,
            kind,
            title: title.into(),
            attempts: 0,
            notes: Vec::new(),
            method: None,
            url: None,
            status: None,
            exit_code: None,
            rows: None,
        }
    }

    /// Records a failure note and marks the result not-ok.
    #[must_use]
    pub fn with_failure(mut self, note: impl Into<String>) -> Self {
        self.ok = false;
        self.notes.push(note.into());
        self
    }

    /// Sets the number of attempts made.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

// ============================================================================
// SECTION: Scenario Results
// ============================================================================

/// Outcome of one scenario.
///
/// # Invariants
/// - `ok` is true iff every executed step passed and none were skipped.
/// - `method`, `url`, and `status` mirror the last executed HTTP step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    /// Scenario identifier.
    pub id: String,
    /// Whether the scenario passed.
    pub ok: bool,
    /// HTTP method of the last executed HTTP step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// URL of the last executed HTTP step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Status of the last executed HTTP step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Failure notes prefixed with their step title.
    pub notes: Vec<String>,
    /// Executed step results in order.
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    /// Folds executed step results into a scenario result.
    ///
    /// `skipped` is the number of declared steps that were not executed.
    #[must_use]
    pub fn from_steps(id: impl Into<String>, steps: Vec<StepResult>, skipped: usize) -> Self {
        let mut notes: Vec<String> = steps
            .iter()
            .filter(|step| !step.ok)
            .flat_map(|step| step.notes.iter().map(move |note| format!("{}: {note}", step.title)))
            .collect();
        if skipped > 0 {
            notes.push(format!("skipped {skipped} remaining step(s)"));
        }
        let last_http = steps.iter().rev().find(|step| step.kind == StepKind::Http);
        Self {
            id: id.into(),
            ok: skipped == 0 && steps.iter().all(|step| step.ok),
            method: last_http.and_then(|step| step.method.clone()),
            url: last_http.and_then(|step| step.url.clone()),
            status: last_http.and_then(|step| step.status),
            notes,
            steps,
        }
    }
}
