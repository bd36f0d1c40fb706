// crates/stoney-runners/src/policy.rs
// ============================================================================
// Module: Retry Policy
// Description: Per-step attempt bounds, timeouts, and linear backoff.
// Purpose: Share one retry loop across the HTTP, process, and SQL runners.
// Dependencies: stoney-core, thiserror, tokio
// ============================================================================

//! ## Overview
//! Every step runs under a [`RetryPolicy`]: `retries + 1` attempts, each
//! bounded by `timeout`, with `n * backoff` between attempt `n - 1` and
//! attempt `n`. Only [`AttemptError::Transient`] is retried. A completed
//! operation whose outcome mismatches its expectation is a result, not an
//! error, and never reaches the retry loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use stoney_core::StepKind;
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::events::RunEvent;
use crate::events::RunEventDetail;
use crate::events::RunEventSink;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
/// Default HTTP retry count.
pub const DEFAULT_HTTP_RETRIES: u32 = 2;
/// Default backoff base delay in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Process-wide runner defaults.
///
/// # Invariants
/// - `timeout` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerDefaults {
    /// Per-attempt timeout applied when a step has none.
    pub timeout: Duration,
    /// HTTP retry count applied when a step has none.
    pub http_retries: u32,
    /// Backoff base delay.
    pub backoff: Duration,
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http_retries: DEFAULT_HTTP_RETRIES,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl RunnerDefaults {
    /// Resolves the policy for one step from its overrides.
    ///
    /// Process and SQL steps default to zero retries since they may carry
    /// side effects.
    #[must_use]
    pub fn policy_for(
        &self,
        kind: StepKind,
        timeout_ms: Option<u64>,
        retries: Option<u32>,
    ) -> RetryPolicy {
        let default_retries = match kind {
            StepKind::Http => self.http_retries,
            StepKind::Exec | StepKind::Sql => 0,
        };
        RetryPolicy {
            timeout: timeout_ms.map_or(self.timeout, Duration::from_millis),
            retries: retries.unwrap_or(default_retries),
            backoff: self.backoff,
        }
    }
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Resolved retry policy for one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Hard per-attempt timeout.
    pub timeout: Duration,
    /// Additional attempts after the first.
    pub retries: u32,
    /// Backoff base delay.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Returns the total attempt bound.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Returns the delay before the zero-based attempt `index`.
    #[must_use]
    pub fn backoff_before(&self, index: u32) -> Duration {
        self.backoff.saturating_mul(index)
    }
}

// ============================================================================
// SECTION: Attempt Errors
// ============================================================================

/// Failure of a single attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// Network, timeout, spawn, or connection failure. Retryable.
    #[error("{0}")]
    Transient(String),
    /// Failure that another attempt cannot fix.
    #[error("{0}")]
    Permanent(String),
    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Final outcome of the retry loop.
#[derive(Debug)]
pub struct Attempted<T> {
    /// Last attempt's outcome.
    pub outcome: Result<T, AttemptError>,
    /// Attempts made.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Retry Loop
// ============================================================================

/// Runs `attempt` until it succeeds, fails permanently, is cancelled, or the
/// attempt bound is exhausted.
///
/// `attempt` receives the one-based attempt number.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    events: &dyn RunEventSink,
    title: &str,
    mut attempt: F,
) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;
    loop {
        if attempts > 0 {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Attempted { outcome: Err(AttemptError::Cancelled), attempts };
                }
                () = tokio::time::sleep(policy.backoff_before(attempts)) => {}
            }
        }
        attempts += 1;
        match attempt(attempts).await {
            Err(AttemptError::Transient(message)) => {
                let retrying = attempts < max_attempts;
                events.record(&RunEvent::now(RunEventDetail::StepAttemptFailed {
                    title: title.to_string(),
                    attempt: attempts,
                    error: message.clone(),
                    retrying,
                }));
                if !retrying {
                    return Attempted {
                        outcome: Err(AttemptError::Transient(message)),
                        attempts,
                    };
                }
            }
            outcome => {
                return Attempted {
                    outcome,
                    attempts,
                };
            }
        }
    }
}
