// crates/stoney-runners/src/orchestrator.rs
// ============================================================================
// Module: Scenario Orchestrator
// Description: Sequential execution of scenarios and suites.
// Purpose: Run steps strictly in order and aggregate the run report.
// Dependencies: stoney-core
// ============================================================================

//! ## Overview
//! At most one step is in flight at any instant: suites, contracts,
//! scenarios, and steps run strictly in declaration order. The orchestrator
//! is the single writer of the report; runners never see it.
//!
//! Fail-fast has two scopes. Scenario-scoped fail-fast stops the remaining
//! steps of a scenario after its first failing step. Run-scoped fail-fast
//! stops the run after the first failed scenario. Cancellation stops both
//! and keeps every result produced so far.

// ============================================================================
// SECTION: Imports
// ============================================================================

use stoney_core::RunReport;
use stoney_core::RunReportBuilder;
use stoney_core::Scenario;
use stoney_core::ScenarioFilter;
use stoney_core::ScenarioResult;
use stoney_core::SuiteDocument;

use crate::events::RunEvent;
use crate::events::RunEventDetail;
use crate::executor::StepContext;
use crate::executor::StepExecutor;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Run-wide execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop a scenario's remaining steps after its first failure.
    pub fail_fast_steps: bool,
    /// Stop the run after the first failed scenario.
    pub fail_fast_run: bool,
    /// Contract and scenario filters.
    pub filter: ScenarioFilter,
}

/// A validated suite and the label of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSuite {
    /// Source label (file path or `issue:<KEY>`).
    pub source: String,
    /// Validated document.
    pub document: SuiteDocument,
}

// ============================================================================
// SECTION: Scenario Execution
// ============================================================================

/// Executes one scenario's steps in order.
pub async fn run_scenario(
    executor: &dyn StepExecutor,
    scenario: &Scenario,
    options: &RunOptions,
    ctx: &StepContext<'_>,
) -> ScenarioResult {
    let mut results = Vec::with_capacity(scenario.steps.len());
    let mut skipped = 0;
    for (index, step) in scenario.steps.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            skipped = scenario.steps.len() - index;
            break;
        }
        let result = executor.execute(step, ctx).await;
        let failed = !result.ok;
        results.push(result);
        if failed && options.fail_fast_steps {
            skipped = scenario.steps.len() - index - 1;
            break;
        }
    }
    ScenarioResult::from_steps(scenario.id.clone(), results, skipped)
}

// ============================================================================
// SECTION: Run Execution
// ============================================================================

/// Executes every selected scenario of every suite and builds the report.
pub async fn run_suites(
    executor: &dyn StepExecutor,
    suites: &[LoadedSuite],
    options: &RunOptions,
    base_url: Option<String>,
    ctx: &StepContext<'_>,
) -> RunReport {
    let mut report = RunReportBuilder::new(base_url);
    for suite in suites {
        report.add_suite(suite.source.clone());
    }

    'run: for suite in suites {
        let suite_name = suite.document.suite_name.as_str();
        for contract in &suite.document.contracts {
            if !options.filter.matches_contract(&contract.name) {
                continue;
            }
            for scenario in &contract.scenarios {
                if !options.filter.matches(&contract.name, &scenario.id) {
                    continue;
                }
                if ctx.cancel.is_cancelled() {
                    break 'run;
                }
                let result = run_scenario(executor, scenario, options, ctx).await;
                ctx.events.record(&RunEvent::now(RunEventDetail::ScenarioFinished {
                    suite: suite_name.to_string(),
                    contract: contract.name.clone(),
                    id: scenario.id.clone(),
                    ok: result.ok,
                    steps: result.steps.len(),
                }));
                let failed = !result.ok;
                report.push(suite_name, &contract.name, result);
                if failed && options.fail_fast_run {
                    break 'run;
                }
            }
        }
    }
    report.finish()
}

/// Returns true when any scenario selected by `filter` has an HTTP step.
#[must_use]
pub fn selection_needs_base_url(suites: &[LoadedSuite], filter: &ScenarioFilter) -> bool {
    suites.iter().any(|suite| {
        suite.document.contracts.iter().any(|contract| {
            contract.scenarios.iter().any(|scenario| {
                filter.matches(&contract.name, &scenario.id) && scenario.has_http_step()
            })
        })
    })
}
