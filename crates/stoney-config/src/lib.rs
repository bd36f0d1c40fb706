// crates/stoney-config/src/lib.rs
// ============================================================================
// Module: Stoney Config
// Description: Optional TOML configuration with environment overrides.
// Purpose: Resolve runner, issue tracker, and event settings for a run.
// Dependencies: serde, stoney-core, thiserror, toml, url
// ============================================================================

//! ## Overview
//! The configuration file is optional. Its path resolves from an explicit
//! argument, then `STONEY_CONFIG`, then `stoney.toml` in the working
//! directory; only the default file may be absent. Files are size-limited,
//! must be UTF-8, and reject unknown keys. Environment variables override
//! file values, and the merged result is validated fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::EventSinkKind;
pub use config::EventsConfig;
pub use config::IssueTrackerSettings;
pub use config::RunnerConfig;
pub use config::StoneyConfig;
