//! `(user_id, session_id, node_id, username, hidden, persistence, status)`
//! — spec §3. Uniquely keyed by `(session_id, node_id)` within a stream.

use crate::ids::{NodeId, SessionId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresenceKey {
    pub session_id: SessionId,
    pub node_id: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Presence {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub node_id: NodeId,
    pub username: String,
    /// Suppresses join/leave announcement traffic (still listed).
    pub hidden: bool,
    /// Hints the stream sink to durably record broadcasts — matches
    /// typically set this `false` (spec §3).
    pub persistence: bool,
    /// Reserved bitmask forwarded verbatim; not interpreted by the match
    /// core (SPEC_FULL §7).
    pub status: u8,
}

impl Presence {
    pub fn key(&self) -> PresenceKey {
        PresenceKey {
            session_id: self.session_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}
