//! Shared error taxonomy (spec §7). Individual crates define narrower
//! operation errors (`CreateMatchError`, `JoinError`, ...) the way the
//! teacher's `crates/server/src/errors.rs` does, and convert into this
//! shared taxonomy at crate boundaries via `From`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCoreError {
    /// Malformed ids, unknown module name, label > 256 bytes, tick rate
    /// out of range, script return of wrong shape.
    InvalidArgument(String),
    /// Match id unknown (on `GetMatch`/`RouteData` after stop).
    NotFound,
    /// Session closing (on `Track`), call-queue timeout (on `JoinAttempt`).
    Unavailable(String),
    /// Script fault during any hook, registry inconsistency.
    Internal(String),
}

impl fmt::Display for MatchCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchCoreError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            MatchCoreError::NotFound => write!(f, "not found"),
            MatchCoreError::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            MatchCoreError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for MatchCoreError {}
