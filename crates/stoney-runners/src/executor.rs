// crates/stoney-runners/src/executor.rs
// ============================================================================
// Module: Step Executor
// Description: Dispatch of typed steps to their runners.
// Purpose: Provide the seam between the orchestrator and concrete runners.
// Dependencies: async-trait, stoney-core, thiserror
// ============================================================================

//! ## Overview
//! [`StepExecutor`] is the only interface the orchestrator sees.
//! [`StepRunners`] implements it by matching on the step variant and
//! delegating to the HTTP, process, or SQL runner, then recording a
//! `step_finished` event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use stoney_core::EnvLookup;
use stoney_core::Step;
use stoney_core::StepResult;
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::events::RunEvent;
use crate::events::RunEventDetail;
use crate::events::RunEventSink;
use crate::exec::ExecRunner;
use crate::http::HttpRunner;
use crate::policy::RunnerDefaults;
use crate::sql::SqlRunner;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runner construction errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Per-run collaborators handed to every step execution.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Timeout, retry, and backoff defaults.
    pub defaults: &'a RunnerDefaults,
    /// Run cancellation signal.
    pub cancel: &'a CancelSignal,
    /// Event sink.
    pub events: &'a dyn RunEventSink,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Executes one step and produces its result. Never fails: every error
/// becomes a not-ok [`StepResult`].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Executes `step`.
    async fn execute(&self, step: &Step, ctx: &StepContext<'_>) -> StepResult;
}

// ============================================================================
// SECTION: Runners
// ============================================================================

/// Production executor backed by the three step runners.
#[derive(Clone)]
pub struct StepRunners {
    /// HTTP runner.
    http: HttpRunner,
    /// Process runner.
    exec: ExecRunner,
    /// SQL runner.
    sql: SqlRunner,
}

impl StepRunners {
    /// Builds the runners for one run.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when the HTTP client cannot be built.
    pub fn new(base_url: Option<String>, env: Arc<dyn EnvLookup>) -> Result<Self, RunnerError> {
        Ok(Self {
            http: HttpRunner::new(base_url)?,
            exec: ExecRunner,
            sql: SqlRunner::new(env),
        })
    }
}

#[async_trait]
impl StepExecutor for StepRunners {
    async fn execute(&self, step: &Step, ctx: &StepContext<'_>) -> StepResult {
        let result = match step {
            Step::Http {
                http,
                expect,
            } => self.http.execute(http, expect.as_ref(), ctx).await,
            Step::Exec {
                exec,
                expect,
            } => self.exec.execute(exec, expect.as_ref(), ctx).await,
            Step::Sql {
                sql,
                expect,
            } => self.sql.execute(sql, expect.as_ref(), ctx).await,
        };
        ctx.events.record(&RunEvent::now(RunEventDetail::StepFinished {
            title: result.title.clone(),
            kind: result.kind,
            ok: result.ok,
            attempts: result.attempts,
        }));
        result
    }
}
