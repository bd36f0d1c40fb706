// crates/stoney-core/src/report.rs
// ============================================================================
// Module: Report Aggregator
// Description: Run-level aggregation of scenario results.
// Purpose: Produce the CI-facing pass/fail report.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`RunReportBuilder`] is the single writer of a run's result list. Entries
//! are appended in execution order and never revised; [`RunReportBuilder::finish`]
//! derives the counts. A run is overall-failed iff at least one scenario
//! failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::results::ScenarioResult;

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Optional contract-name and scenario-id filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Only run the contract with this exact name.
    pub contract: Option<String>,
    /// Only run scenarios with this exact id.
    pub scenario: Option<String>,
}

impl ScenarioFilter {
    /// Returns true when the contract passes the contract filter.
    #[must_use]
    pub fn matches_contract(&self, contract: &str) -> bool {
        self.contract.as_deref().is_none_or(|wanted| wanted == contract)
    }

    /// Returns true when the scenario passes both filters.
    #[must_use]
    pub fn matches(&self, contract: &str, scenario_id: &str) -> bool {
        self.matches_contract(contract)
            && self.scenario.as_deref().is_none_or(|wanted| wanted == scenario_id)
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Scenario result tagged with its suite and contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Suite display name.
    pub suite: String,
    /// Contract name.
    pub contract: String,
    /// Scenario outcome.
    #[serde(flatten)]
    pub result: ScenarioResult,
}

/// Final run report.
///
/// # Invariants
/// - `total == passed + failed == results.len()`.
/// - `ok == (failed == 0)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Base URL HTTP steps ran against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Source labels of the loaded suites.
    pub suites: Vec<String>,
    /// Number of executed scenarios.
    pub total: usize,
    /// Number of failed scenarios.
    pub failed: usize,
    /// Number of passed scenarios.
    pub passed: usize,
    /// Whether every scenario passed.
    pub ok: bool,
    /// Per-scenario entries in execution order.
    pub results: Vec<ReportEntry>,
}

/// Append-only accumulator for a run report.
#[derive(Debug, Clone, Default)]
pub struct RunReportBuilder {
    /// Base URL recorded in the report.
    base_url: Option<String>,
    /// Source labels.
    suites: Vec<String>,
    /// Entries in execution order.
    results: Vec<ReportEntry>,
}

impl RunReportBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub const fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            suites: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Records a loaded suite source label.
    pub fn add_suite(&mut self, label: impl Into<String>) {
        self.suites.push(label.into());
    }

    /// Appends a scenario result.
    pub fn push(&mut self, suite: &str, contract: &str, result: ScenarioResult) {
        self.results.push(ReportEntry {
            suite: suite.to_string(),
            contract: contract.to_string(),
            result,
        });
    }

    /// Returns the number of failed scenarios recorded so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|entry| !entry.result.ok).count()
    }

    /// Derives counts and returns the final report.
    #[must_use]
    pub fn finish(self) -> RunReport {
        let failed = self.failed();
        let total = self.results.len();
        RunReport {
            base_url: self.base_url,
            suites: self.suites,
            total,
            failed,
            passed: total - failed,
            ok: failed == 0,
            results: self.results,
        }
    }
}
