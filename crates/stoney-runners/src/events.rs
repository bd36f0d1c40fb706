// crates/stoney-runners/src/events.rs
// ============================================================================
// Module: Run Events
// Description: Structured JSON-line events emitted while a run executes.
// Purpose: Expose retries and outcomes without a logging framework.
// Dependencies: serde, serde_json, stoney-core
// ============================================================================

//! ## Overview
//! Runners and the orchestrator report progress through a [`RunEventSink`].
//! Events are serialized as one JSON object per line with an `event` tag and
//! a `timestamp_ms` field. Sinks never fail the run: a write error drops the
//! event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use stoney_core::StepKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Run event envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event payload.
    #[serde(flatten)]
    pub detail: RunEventDetail,
}

/// Run event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEventDetail {
    /// A step attempt failed with a transient error.
    StepAttemptFailed {
        /// Step title.
        title: String,
        /// One-based attempt number.
        attempt: u32,
        /// Error message.
        error: String,
        /// Whether another attempt follows.
        retrying: bool,
    },
    /// A step produced its result.
    StepFinished {
        /// Step title.
        title: String,
        /// Step kind.
        kind: StepKind,
        /// Step outcome.
        ok: bool,
        /// Attempts made.
        attempts: u32,
    },
    /// A scenario produced its result.
    ScenarioFinished {
        /// Suite display name.
        suite: String,
        /// Contract name.
        contract: String,
        /// Scenario identifier.
        id: String,
        /// Scenario outcome.
        ok: bool,
        /// Executed step count.
        steps: usize,
    },
}

impl RunEvent {
    /// Stamps `detail` with the current time.
    #[must_use]
    pub fn now(detail: RunEventDetail) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Event sink for run progress.
pub trait RunEventSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: &RunEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl RunEventSink for NoopEventSink {
    fn record(&self, _event: &RunEvent) {}
}

/// Sink that writes JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrEventSink;

impl RunEventSink for StderrEventSink {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// Open append-mode file handle.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens (or creates) the event file in append mode.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RunEventSink for FileEventSink {
    fn record(&self, event: &RunEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}
