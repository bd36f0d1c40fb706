// crates/stoney-config/src/config.rs
// ============================================================================
// Module: Stoney Configuration
// Description: Configuration loading, env overrides, and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, stoney-core, toml, url
// ============================================================================

//! ## Overview
//! ```toml
//! [runner]
//! base_url = "http://localhost:4000"
//! timeout_ms = 15000
//! retries = 2
//! backoff_ms = 500
//!
//! [issue_tracker]
//! base_url = "https://example.atlassian.net"
//! email = "ci@example.com"
//!
//! [events]
//! sink = "file"
//! path = "stoney-events.jsonl"
//! ```
//! The issue tracker credential is read from the environment only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use stoney_core::EnvLookup;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stoney.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STONEY_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Environment override for the target base URL.
pub const BASE_URL_ENV: &str = "STONEY_BASE_URL";
/// Environment override for the per-attempt timeout.
pub const TIMEOUT_ENV: &str = "STONEY_TIMEOUT_MS";
/// Environment override for the HTTP retry count.
pub const RETRIES_ENV: &str = "STONEY_RETRIES";
/// Environment override for the backoff base delay.
pub const BACKOFF_ENV: &str = "STONEY_BACKOFF_MS";
/// Environment override for the event sink kind.
pub const EVENTS_ENV: &str = "STONEY_EVENTS";
/// Environment override for the event file path.
pub const EVENTS_PATH_ENV: &str = "STONEY_EVENTS_PATH";
/// Environment override for the issue tracker base URL.
pub const ISSUE_BASE_URL_ENV: &str = "JIRA_BASE_URL";
/// Environment override for the issue tracker identity.
pub const ISSUE_EMAIL_ENV: &str = "JIRA_EMAIL";

/// Default per-attempt timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
/// Default HTTP retry count.
const DEFAULT_RETRIES: u32 = 2;
/// Default backoff base delay in milliseconds.
const DEFAULT_BACKOFF_MS: u64 = 500;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoneyConfig {
    /// Runner defaults.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Issue tracker connection settings (credential excluded).
    #[serde(default)]
    pub issue_tracker: IssueTrackerSettings,
    /// Event sink selection.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Runner defaults.
///
/// # Invariants
/// - `timeout_ms` is non-zero after validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Target base URL for HTTP steps.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// HTTP retry count.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Backoff base delay in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

/// Issue tracker connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueTrackerSettings {
    /// Tracker base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Account identity.
    #[serde(default)]
    pub email: Option<String>,
}

/// Event sink kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSinkKind {
    /// Discard events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

impl FromStr for EventSinkKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "stderr" => Ok(Self::Stderr),
            "file" => Ok(Self::File),
            other => Err(ConfigError::Invalid(format!(
                "unknown event sink: {other} (expected none, stderr, or file)"
            ))),
        }
    }
}

impl fmt::Display for EventSinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Stderr => "stderr",
            Self::File => "file",
        })
    }
}

/// Event sink selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: EventSinkKind,
    /// Event file path (required for the file sink).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Serde default for [`RunnerConfig::timeout_ms`].
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Serde default for [`RunnerConfig::retries`].
const fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

/// Serde default for [`RunnerConfig::backoff_ms`].
const fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl StoneyConfig {
    /// Resolves, loads, overrides, and validates configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicitly named file is missing or
    /// when loading, overriding, or validation fails.
    pub fn load(path: Option<&Path>, env: &dyn EnvLookup) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path, env)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves, loads, and applies environment overrides without validating.
    ///
    /// Callers layering further overrides must call [`Self::validate`] once
    /// they are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicitly named file is missing or
    /// when loading or an environment override fails.
    pub fn load_unvalidated(path: Option<&Path>, env: &dyn EnvLookup) -> Result<Self, ConfigError> {
        let mut config = match resolve_path(path, env) {
            Some(resolved) => Self::load_file(&resolved)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Parses one configuration file without overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, oversized, not
    /// UTF-8, or not valid TOML for this schema.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric or enumerated variable
    /// cannot be parsed.
    pub fn apply_env(&mut self, env: &dyn EnvLookup) -> Result<(), ConfigError> {
        if let Some(base_url) = non_empty(env, BASE_URL_ENV) {
            self.runner.base_url = Some(base_url);
        }
        if let Some(timeout_ms) = parse_env(env, TIMEOUT_ENV)? {
            self.runner.timeout_ms = timeout_ms;
        }
        if let Some(retries) = parse_env(env, RETRIES_ENV)? {
            self.runner.retries = retries;
        }
        if let Some(backoff_ms) = parse_env(env, BACKOFF_ENV)? {
            self.runner.backoff_ms = backoff_ms;
        }
        if let Some(base_url) = non_empty(env, ISSUE_BASE_URL_ENV) {
            self.issue_tracker.base_url = Some(base_url);
        }
        if let Some(email) = non_empty(env, ISSUE_EMAIL_ENV) {
            self.issue_tracker.email = Some(email);
        }
        if let Some(sink) = non_empty(env, EVENTS_ENV) {
            self.events.sink = sink.parse()?;
        }
        if let Some(path) = non_empty(env, EVENTS_PATH_ENV) {
            self.events.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.runner.validate()?;
        self.issue_tracker.validate()?;
        self.events.validate()
    }
}

impl RunnerConfig {
    /// Validates runner defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "runner.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(base_url) = &self.base_url {
            validate_http_url("runner.base_url", base_url)?;
        }
        Ok(())
    }
}

impl IssueTrackerSettings {
    /// Validates issue tracker settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base_url) = &self.base_url {
            validate_http_url("issue_tracker.base_url", base_url)?;
        }
        Ok(())
    }
}

impl EventsConfig {
    /// Validates event sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sink == EventSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid(
                "events.path is required when events.sink = \"file\"".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; `None` means no file should be read.
fn resolve_path(path: Option<&Path>, env: &dyn EnvLookup) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.to_path_buf());
    }
    if let Some(env_path) = non_empty(env, CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    default.is_file().then_some(default)
}

/// Reads a variable, treating blank values as unset.
fn non_empty(env: &dyn EnvLookup, name: &str) -> Option<String> {
    env.var(name).filter(|value| !value.trim().is_empty())
}

/// Parses a numeric variable when set.
fn parse_env<T: FromStr>(env: &dyn EnvLookup, name: &str) -> Result<Option<T>, ConfigError> {
    non_empty(env, name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ConfigError::Invalid(format!("{name} must be a non-negative integer, got {raw}"))
            })
        })
        .transpose()
}

/// Requires an absolute `http`/`https` URL.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    Ok(())
}
