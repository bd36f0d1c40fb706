// crates/stoney-runners/src/cancel.rs
// ============================================================================
// Module: Cancellation
// Description: Run-wide cancellation signal and timeout races.
// Purpose: Give every runner one uniform way to stop in-flight work.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! A [`CancelHandle`] is owned by whoever may stop the run (the CLI's Ctrl-C
//! listener); every runner receives a cloned [`CancelSignal`]. [`race`] runs a
//! future against both a per-attempt timer and the signal. Losing the race
//! drops the future, and callers that own external resources (child
//! processes, database sessions) release them explicitly afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Owner side of the run cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    /// Shared flag sender.
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Creates a handle in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Cancels the run. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the run cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    /// Shared flag receiver.
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Returns a signal that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self {
            receiver,
        }
    }

    /// Returns true once the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves when the run is cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// SECTION: Races
// ============================================================================

/// Reason a raced future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The per-attempt timer fired first.
    TimedOut,
    /// The run was cancelled first.
    Cancelled,
}

/// Runs `future` until it completes, `timeout` elapses, or `cancel` fires.
///
/// # Errors
///
/// Returns [`Interrupt`] when the future lost the race; it has been dropped.
pub async fn race<F>(future: F, timeout: Duration, cancel: &CancelSignal) -> Result<F::Output, Interrupt>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupt::Cancelled),
        outcome = tokio::time::timeout(timeout, future) => outcome.map_err(|_| Interrupt::TimedOut),
    }
}
