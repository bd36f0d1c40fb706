// crates/stoney-runners/src/exec.rs
// ============================================================================
// Module: Process Step Runner
// Description: Executes shell commands with captured output.
// Purpose: Run local setup and assertion commands as scenario steps.
// Dependencies: stoney-core, tokio
// ============================================================================

//! ## Overview
//! Commands run through `sh -c` (`cmd /C` on Windows) with stdin closed,
//! inheriting the process environment merged with the step's overrides.
//! Output is captured fully in memory. The per-attempt timeout covers both the
//! exit of the shell and the end of its output, so a background process that
//! keeps the pipes open cannot outlive the step. A timed-out or cancelled
//! attempt kills the child and stops capturing; spawn failures and timeouts
//! are transient.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use stoney_core::ExecExpectation;
use stoney_core::ExecStep;
use stoney_core::StepKind;
use stoney_core::StepResult;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::cancel::CancelSignal;
use crate::cancel::Interrupt;
use crate::cancel::race;
use crate::executor::StepContext;
use crate::policy::AttemptError;
use crate::policy::run_with_retry;

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Process step runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecRunner;

/// Completed process outcome.
struct ProcessOutput {
    /// Exit status.
    status: ExitStatus,
    /// Captured standard output.
    stdout: String,
    /// Captured standard error.
    stderr: String,
}

/// Background capture task for one output stream.
type Capture = JoinHandle<std::io::Result<Vec<u8>>>;

impl ExecRunner {
    /// Executes one process step.
    pub async fn execute(
        &self,
        step: &ExecStep,
        expect: Option<&ExecExpectation>,
        ctx: &StepContext<'_>,
    ) -> StepResult {
        let title = format!("exec {}", step.run);
        let result = StepResult::new(StepKind::Exec, title.clone());
        let policy = ctx.defaults.policy_for(StepKind::Exec, step.timeout_ms, step.retries);
        let cancel = ctx.cancel;
        let attempted = run_with_retry(&policy, cancel, ctx.events, &title, move |_| {
            run_once(step, policy.timeout, cancel)
        })
        .await;

        let result = result.with_attempts(attempted.attempts);
        match attempted.outcome {
            Ok(output) => evaluate(result, &output, expect),
            Err(AttemptError::Cancelled) => result.with_failure("cancelled"),
            Err(err) => result.with_failure(format!("Exec error: {err}")),
        }
    }
}

/// Spawns the command once and waits for exit and output under the timeout.
async fn run_once(
    step: &ExecStep,
    timeout: Duration,
    cancel: &CancelSignal,
) -> Result<ProcessOutput, AttemptError> {
    let mut command = shell_command(&step.run);
    command
        .envs(&step.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &step.cwd {
        command.current_dir(cwd);
    }
    let mut child = command
        .spawn()
        .map_err(|err| AttemptError::Transient(format!("failed to spawn command: {err}")))?;
    let mut stdout = capture(child.stdout.take());
    let mut stderr = capture(child.stderr.take());

    // Background processes holding the pipes keep capture open; the timer
    // covers both the exit and the end of output.
    let completed = race(
        async {
            let status = child
                .wait()
                .await
                .map_err(|err| AttemptError::Transient(format!("failed to wait for command: {err}")))?;
            Ok::<_, AttemptError>(ProcessOutput {
                status,
                stdout: collect(&mut stdout).await?,
                stderr: collect(&mut stderr).await?,
            })
        },
        timeout,
        cancel,
    )
    .await;
    match completed {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => {
            stop(&mut child, &stdout, &stderr).await;
            Err(err)
        }
        Err(Interrupt::TimedOut) => {
            stop(&mut child, &stdout, &stderr).await;
            Err(AttemptError::Transient(format!("exec timeout after {}ms", timeout.as_millis())))
        }
        Err(Interrupt::Cancelled) => {
            stop(&mut child, &stdout, &stderr).await;
            Err(AttemptError::Cancelled)
        }
    }
}

/// Builds the platform shell invocation for `run`.
fn shell_command(run: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(run);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(run);
        command
    }
}

/// Starts reading a piped stream to completion in the background.
fn capture<R>(stream: Option<R>) -> Capture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            stream.read_to_end(&mut buffer).await?;
        }
        Ok(buffer)
    })
}

/// Waits for a capture task and decodes its bytes.
async fn collect(task: &mut Capture) -> Result<String, AttemptError> {
    match task.await {
        Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Ok(Err(err)) => Err(AttemptError::Transient(format!("failed to capture output: {err}"))),
        Err(err) => Err(AttemptError::Transient(format!("output capture task failed: {err}"))),
    }
}

/// Force-kills the child and abandons output capture.
async fn stop(child: &mut Child, stdout: &Capture, stderr: &Capture) {
    let _ = child.kill().await;
    stdout.abort();
    stderr.abort();
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Checks a completed process against the expectation.
fn evaluate(
    mut result: StepResult,
    output: &ProcessOutput,
    expect: Option<&ExecExpectation>,
) -> StepResult {
    let code = output.status.code();
    result.exit_code = code;
    let expected_code = expect.and_then(|expect| expect.exit_code).unwrap_or(0);
    if code != Some(expected_code) {
        let actual = code.map_or_else(|| "none (terminated by signal)".to_string(), |code| code.to_string());
        result = result.with_failure(format!("Expected exit_code {expected_code} but got {actual}."));
    }
    let Some(expect) = expect else {
        return result;
    };
    if let Some(needle) = &expect.stdout_contains
        && !output.stdout.contains(needle.as_str())
    {
        result = result.with_failure(format!("Expected stdout to contain: \"{needle}\""));
    }
    if let Some(needle) = &expect.stderr_contains
        && !output.stderr.contains(needle.as_str())
    {
        result = result.with_failure(format!("Expected stderr to contain: \"{needle}\""));
    }
    result
}
