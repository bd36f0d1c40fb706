// crates/stoney-runners/tests/exec_runner.rs
// ============================================================================
// Module: Process Runner Tests
// Description: Tests for shell execution, capture, and timeouts.
// ============================================================================
//! ## Overview
//! Runs real `sh -c` commands; Unix only.

#![cfg(unix)]
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

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use stoney_core::ExecExpectation;
use stoney_core::ExecStep;
use stoney_runners::CancelSignal;
use stoney_runners::ExecRunner;

use crate::common::RecordingSink;
use crate::common::context;
use crate::common::fast_defaults;

fn command(run: &str) -> ExecStep {
    ExecStep {
        run: run.to_string(),
        cwd: None,
        env: BTreeMap::new(),
        timeout_ms: None,
        retries: None,
    }
}

#[tokio::test]
async fn captures_stdout_and_defaults_to_exit_code_zero() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let expect = ExecExpectation {
        stdout_contains: Some("hello world".to_string()),
        ..ExecExpectation::default()
    };

    let result = ExecRunner
        .execute(&command("echo hello world"), Some(&expect), &context(&defaults, &cancel, &sink))
        .await;

    assert!(result.ok, "{:?}", result.notes);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.attempts, 1);
    assert_eq!(result.title, "exec echo hello world");
}

#[tokio::test]
async fn expected_non_zero_exit_code_passes() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let expect = ExecExpectation {
        exit_code: Some(3),
        stderr_contains: Some("oops".to_string()),
        ..ExecExpectation::default()
    };

    let result = ExecRunner
        .execute(&command("echo oops 1>&2; exit 3"), Some(&expect), &context(&defaults, &cancel, &sink))
        .await;

    assert!(result.ok, "{:?}", result.notes);
    assert_eq!(result.exit_code, Some(3));
}

#[tokio::test]
async fn exit_code_mismatch_is_not_retried() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let mut step = command("exit 1");
    step.retries = Some(2);

    let result = ExecRunner.execute(&step, None, &context(&defaults, &cancel, &sink)).await;

    assert!(!result.ok);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.notes, vec!["Expected exit_code 0 but got 1.".to_string()]);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn env_overrides_and_cwd_apply() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().file_name().unwrap().to_string_lossy().to_string();
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let mut step = command("printf '%s ' \"$GREETING\"; pwd");
    step.env.insert("GREETING".to_string(), "bonjour".to_string());
    step.cwd = Some(dir.path().to_string_lossy().to_string());
    let expect = ExecExpectation {
        stdout_contains: Some("bonjour".to_string()),
        ..ExecExpectation::default()
    };

    let result = ExecRunner.execute(&step, Some(&expect), &context(&defaults, &cancel, &sink)).await;
    assert!(result.ok, "{:?}", result.notes);

    let expect = ExecExpectation {
        stdout_contains: Some(marker),
        ..ExecExpectation::default()
    };
    let result = ExecRunner.execute(&step, Some(&expect), &context(&defaults, &cancel, &sink)).await;
    assert!(result.ok, "{:?}", result.notes);
}

#[tokio::test]
async fn timeout_kills_and_retries() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let mut step = command("sleep 5");
    step.timeout_ms = Some(200);
    step.retries = Some(1);

    let started = Instant::now();
    let result = ExecRunner.execute(&step, None, &context(&defaults, &cancel, &sink)).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!result.ok);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.notes, vec!["Exec error: exec timeout after 200ms".to_string()]);
    assert_eq!(sink.tags(), vec!["step_attempt_failed", "step_attempt_failed"]);
}

#[tokio::test]
async fn timeout_covers_background_process_holding_output() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let mut step = command("sleep 4 & echo started");
    step.timeout_ms = Some(300);

    let started = Instant::now();
    let result = ExecRunner.execute(&step, None, &context(&defaults, &cancel, &sink)).await;

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert!(!result.ok);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.notes, vec!["Exec error: exec timeout after 300ms".to_string()]);
}

#[tokio::test]
async fn spawn_failure_is_reported() {
    let defaults = fast_defaults();
    let cancel = CancelSignal::never();
    let sink = RecordingSink::default();
    let mut step = command("true");
    step.cwd = Some("/definitely/not/a/real/dir".to_string());

    let result = ExecRunner.execute(&step, None, &context(&defaults, &cancel, &sink)).await;

    assert!(!result.ok);
    assert!(result.notes[0].starts_with("Exec error: failed to spawn command"), "{:?}", result.notes);
}
