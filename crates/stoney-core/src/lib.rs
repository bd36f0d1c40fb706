// crates/stoney-core/src/lib.rs
// ============================================================================
// Module: Stoney Core
// Description: Suite model, loader, interpolation, matching, and reporting.
// Purpose: Provide the pure, side-effect free half of the contract runner.
// Dependencies: regex, serde, serde_json, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Stoney runs contract suites against a live target. This crate owns the
//! parts that never touch the network or spawn processes:
//! - [`loader`] turns untrusted YAML/JSON documents into a validated
//!   [`SuiteDocument`], normalizing legacy single-step scenarios.
//! - [`interpolate`] substitutes `${NAME}` placeholders through an injected
//!   [`EnvLookup`].
//! - [`matcher`] implements the one-directional deep-subset match used by
//!   every step runner.
//! - [`results`] and [`report`] define the immutable result records and the
//!   run-level aggregation.
//!
//! Invariants:
//! - A [`SuiteDocument`] only exists after every field has been validated.
//! - Downstream code never sees the legacy scenario shape.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod env;
pub mod interpolate;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod report;
pub mod results;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use env::EnvLookup;
pub use env::ProcessEnv;
pub use env::StaticEnv;
pub use interpolate::interpolate;
pub use interpolate::interpolate_str;
pub use loader::SUPPORTED_VERSION;
pub use loader::SchemaError;
pub use loader::SuiteFormat;
pub use loader::load_suite_file;
pub use loader::load_suite_str;
pub use loader::load_suite_value;
pub use matcher::deep_subset_match;
pub use model::Contract;
pub use model::ExecExpectation;
pub use model::ExecStep;
pub use model::HttpExpectation;
pub use model::HttpStep;
pub use model::Scenario;
pub use model::SqlDriver;
pub use model::SqlExpectation;
pub use model::SqlStep;
pub use model::Step;
pub use model::StepKind;
pub use model::SuiteDocument;
pub use report::ReportEntry;
pub use report::RunReport;
pub use report::RunReportBuilder;
pub use report::ScenarioFilter;
pub use results::ScenarioResult;
pub use results::StepResult;
