// crates/stoney-cli/src/lib.rs
// ============================================================================
// Module: Stoney CLI Library
// Description: Shared helpers for the `stoney` binary.
// Purpose: Expose the message catalog to the binary and its tests.
// Dependencies: Standard library only.
// ============================================================================

//! ## Overview
//! The binary routes every user-facing string through [`i18n`] and the
//! [`t!`](crate::t) macro.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod i18n;
