//! Non-tick actions carried on the call queue (spec §4.D item 3: "join
//! attempts, leaves, external label updates").

use join_coordinator::JoinAttemptRequest;
use match_core::{Presence, PresenceKey};

pub enum Call {
    JoinAttempt(JoinAttemptRequest),
    /// The client signaled join completion (spec §4.F step 2, "Mark").
    Confirm(PresenceKey),
    /// An out-of-band leave not driven by a module `kick` (e.g. a
    /// session disconnecting without finishing the handshake).
    Leave(Presence),
    /// Forces the listing label without going through a hook (an
    /// admin/registry-level override, distinct from the in-hook
    /// `dispatcher:match_label_update`).
    LabelUpdate(String),
}

#[derive(Debug)]
pub struct CallQueueOverflow;

impl std::fmt::Display for CallQueueOverflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call queue is at capacity")
    }
}

impl std::error::Error for CallQueueOverflow {}
