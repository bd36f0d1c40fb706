// crates/stoney-runners/src/lib.rs
// ============================================================================
// Module: Stoney Runners
// Description: Step runners, retry policy, and the scenario orchestrator.
// Purpose: Execute validated suites against a live target.
// Dependencies: async-trait, reqwest, tokio, tokio-postgres, stoney-core
// ============================================================================

//! ## Overview
//! This crate is the effectful half of Stoney. Each step kind has a runner
//! sharing one retry loop ([`policy::run_with_retry`]) and one cancellation
//! model ([`cancel`]). Transient execution failures are retried; completed
//! operations whose outcome mismatches the expectation are recorded and never
//! retried. The [`orchestrator`] runs scenarios sequentially and is the single
//! writer of the run report.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cancel;
pub mod events;
pub mod exec;
pub mod executor;
pub mod http;
pub mod orchestrator;
pub mod policy;
pub mod sql;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelHandle;
pub use cancel::CancelSignal;
pub use events::FileEventSink;
pub use events::NoopEventSink;
pub use events::RunEvent;
pub use events::RunEventDetail;
pub use events::RunEventSink;
pub use events::StderrEventSink;
pub use exec::ExecRunner;
pub use executor::RunnerError;
pub use executor::StepContext;
pub use executor::StepExecutor;
pub use executor::StepRunners;
pub use http::HttpRunner;
pub use orchestrator::LoadedSuite;
pub use orchestrator::RunOptions;
pub use orchestrator::run_scenario;
pub use orchestrator::run_suites;
pub use orchestrator::selection_needs_base_url;
pub use policy::AttemptError;
pub use policy::RetryPolicy;
pub use policy::RunnerDefaults;
pub use sql::SqlRunner;
