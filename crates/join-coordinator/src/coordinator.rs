//! The synchronous `JoinAttempt` protocol (spec §4.E, §4.F, §5): the
//! caller enqueues a request onto the handler's call queue and blocks on
//! a reply channel. Grounded on `crates/server/src/match_handle.rs`'s
//! `join_player`, generalized from an in-process `await` on a `Mutex` to
//! a call-queue request/reply (since the approving party is now a user
//! script hook, not a direct state mutation).

use match_core::{CoreValue, Presence};
use tokio::sync::oneshot;

/// The hook's verdict on a join attempt (spec §4.C `join_attempt` return,
/// §4.E `JoinAttempt` output).
#[derive(Clone, Debug)]
pub struct JoinVerdict {
    pub allow: bool,
    pub reason: Option<String>,
    pub label: String,
}

impl JoinVerdict {
    pub fn timeout(label: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: Some("timeout".to_string()),
            label: label.into(),
        }
    }
}

/// A join attempt queued onto a match's call queue, carrying a reply
/// channel the registry's `JoinAttempt` call awaits on.
pub struct JoinAttemptRequest {
    pub presence: Presence,
    /// Client-supplied join metadata, forwarded verbatim to the
    /// `join_attempt` hook (spec §4.C).
    pub metadata: CoreValue,
    pub reply: oneshot::Sender<JoinVerdict>,
}
