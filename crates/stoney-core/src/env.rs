// crates/stoney-core/src/env.rs
// ============================================================================
// Module: Environment Lookup
// Description: Injectable access to environment variables.
// Purpose: Keep process-global state out of the loader and runners.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every component that reads environment variables (interpolation, the
//! database runner, issue-tracker and config resolution) takes a
//! `&dyn EnvLookup` instead of calling [`std::env::var`] directly, so tests
//! can substitute a [`StaticEnv`] without touching the real environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Read-only environment variable lookup.
pub trait EnvLookup: Send + Sync {
    /// Returns the value of `name`, or `None` when it is unset or not UTF-8.
    fn var(&self, name: &str) -> Option<String>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Lookup backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Lookup backed by a fixed map.
///
/// # Invariants
/// - Contents never change after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticEnv {
    /// Variables visible through this lookup.
    vars: BTreeMap<String, String>,
}

impl StaticEnv {
    /// Creates an empty lookup.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Returns a copy of this lookup with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for StaticEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
        }
    }
}

impl EnvLookup for StaticEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
