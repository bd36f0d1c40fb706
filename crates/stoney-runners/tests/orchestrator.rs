// crates/stoney-runners/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: Tests for ordering, fail-fast scopes, filters, and cancellation.
// ============================================================================
//! ## Overview
//! Uses a scripted executor to observe exactly which steps run, plus one
//! end-to-end run against a local HTTP target.

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

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use stoney_core::ScenarioFilter;
use stoney_core::StaticEnv;
use stoney_core::Step;
use stoney_core::StepResult;
use stoney_runners::CancelHandle;
use stoney_runners::CancelSignal;
use stoney_runners::LoadedSuite;
use stoney_runners::RunOptions;
use stoney_runners::StepContext;
use stoney_runners::StepExecutor;
use stoney_runners::StepRunners;
use stoney_runners::run_suites;
use stoney_runners::selection_needs_base_url;

use crate::common::RecordingSink;
use crate::common::context;
use crate::common::fast_defaults;
use crate::common::respond_json;
use crate::common::spawn_server;
use crate::common::suite;

/// Executor that records step commands and fails those starting with `fail`.
#[derive(Default)]
struct ScriptedExecutor {
    executed: Mutex<Vec<String>>,
    cancel_after_first: Option<CancelHandle>,
}

impl ScriptedExecutor {
    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, step: &Step, _ctx: &StepContext<'_>) -> StepResult {
        let Step::Exec {
            exec, ..
        } = step
        else {
            panic!("scripted suites only use exec steps");
        };
        self.executed.lock().unwrap().push(exec.run.clone());
        if let Some(handle) = &self.cancel_after_first {
            handle.cancel();
        }
        let result = StepResult::new(step.kind(), step.title()).with_attempts(1);
        if exec.run.starts_with("fail") { result.with_failure("scripted failure") } else { result }
    }
}

fn scenario(id: &str, runs: &[&str]) -> Value {
    let steps: Vec<Value> = runs.iter().map(|run| json!({"exec": {"run": run}})).collect();
    json!({"id": id, "steps": steps})
}

fn two_scenario_suite() -> LoadedSuite {
    let document = json!({
        "version": 1,
        "suite": "scripted",
        "contracts": [{
            "name": "c",
            "scenarios": [
                scenario("first", &["fail-A", "B"]),
                scenario("second", &["C"]),
            ]
        }]
    });
    LoadedSuite {
        source: "scripted.yml".to_string(),
        document: suite(&document),
    }
}

#[tokio::test]
async fn scenario_fail_fast_skips_remaining_steps_but_not_next_scenario() {
    let executor = ScriptedExecutor::default();
    let options = RunOptions {
        fail_fast_steps: true,
        ..RunOptions::default()
    };
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &[two_scenario_suite()],
        &options,
        None,
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!(executor.executed(), vec!["fail-A", "C"]);
    assert_eq!((report.total, report.failed, report.passed, report.ok), (2, 1, 1, false));
    let first = &report.results[0].result;
    assert_eq!(first.steps.len(), 1);
    assert!(first.notes.contains(&"skipped 1 remaining step(s)".to_string()));
    assert!(first.notes.contains(&"exec fail-A: scripted failure".to_string()));
    assert!(report.results[1].result.ok);
}

#[tokio::test]
async fn without_fail_fast_every_step_runs() {
    let executor = ScriptedExecutor::default();
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &[two_scenario_suite()],
        &RunOptions::default(),
        None,
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!(executor.executed(), vec!["fail-A", "B", "C"]);
    assert_eq!(report.results[0].result.steps.len(), 2);
    assert!(!report.results[0].result.ok);
}

#[tokio::test]
async fn run_fail_fast_stops_after_first_failed_scenario() {
    let executor = ScriptedExecutor::default();
    let options = RunOptions {
        fail_fast_steps: true,
        fail_fast_run: true,
        ..RunOptions::default()
    };
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &[two_scenario_suite()],
        &options,
        None,
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!(executor.executed(), vec!["fail-A"]);
    assert_eq!((report.total, report.failed), (1, 1));
}

#[tokio::test]
async fn filters_apply_before_counting() {
    let executor = ScriptedExecutor::default();
    let options = RunOptions {
        filter: ScenarioFilter {
            contract: Some("c".to_string()),
            scenario: Some("second".to_string()),
        },
        ..RunOptions::default()
    };
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &[two_scenario_suite()],
        &options,
        None,
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!(executor.executed(), vec!["C"]);
    assert_eq!((report.total, report.passed, report.ok), (1, 1, true));
    assert_eq!(report.suites, vec!["scripted.yml".to_string()]);
}

#[tokio::test]
async fn cancellation_stops_run_and_keeps_partial_results() {
    let handle = CancelHandle::new();
    let executor = ScriptedExecutor {
        executed: Mutex::new(Vec::new()),
        cancel_after_first: Some(handle.clone()),
    };
    let defaults = fast_defaults();
    let cancel = handle.signal();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &[two_scenario_suite()],
        &RunOptions::default(),
        None,
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!(executor.executed(), vec!["fail-A"]);
    assert_eq!(report.total, 1);
    assert!(!report.ok);
    assert!(report.results[0].result.notes.contains(&"skipped 1 remaining step(s)".to_string()));
}

#[tokio::test]
async fn end_to_end_health_check_passes() {
    let server = spawn_server(|request| {
        if request.url() == "/health" {
            respond_json(request, 200, &json!({"ok": true}));
        } else {
            respond_json(request, 404, &json!({"ok": false}));
        }
    });
    let document = json!({
        "version": 1,
        "suite": "s",
        "contracts": [{
            "name": "c",
            "scenarios": [{
                "id": "ping",
                "steps": [{
                    "http": {"method": "GET", "path": "/health"},
                    "expect": {"status": 200, "json": {"ok": true}}
                }]
            }]
        }]
    });
    let suites = vec![LoadedSuite {
        source: "inline".to_string(),
        document: suite(&document),
    }];
    assert!(selection_needs_base_url(&suites, &ScenarioFilter::default()));

    let executor =
        StepRunners::new(Some(server.base_url.clone()), Arc::new(StaticEnv::new())).unwrap();
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();

    let report = run_suites(
        &executor,
        &suites,
        &RunOptions::default(),
        Some(server.base_url.clone()),
        &context(&defaults, &cancel, &sink),
    )
    .await;

    assert_eq!((report.total, report.failed, report.passed, report.ok), (1, 0, 1, true));
    let entry = &report.results[0];
    assert!(entry.result.ok);
    assert_eq!(entry.result.status, Some(200));
    assert_eq!(entry.result.method.as_deref(), Some("GET"));
    assert_eq!(sink.tags(), vec!["step_finished", "scenario_finished"]);
}

#[test]
fn exec_only_selection_needs_no_base_url() {
    let suites = [two_scenario_suite()];
    assert!(!selection_needs_base_url(&suites, &ScenarioFilter::default()));
}
