//! A *stream* names the set of presences receiving a match's broadcasts
//! (spec §3): `(mode=MATCH_AUTHORITATIVE, subject=match_id, descriptor=⊥,
//! label=node_id)`. Every match has exactly one associated stream.

use crate::ids::{MatchId, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    MatchAuthoritative,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Stream {
    pub mode: StreamMode,
    pub subject: MatchId,
    pub label: NodeId,
}

impl Stream {
    pub fn for_match(match_id: MatchId, node: NodeId) -> Self {
        Self {
            mode: StreamMode::MatchAuthoritative,
            subject: match_id,
            label: node,
        }
    }
}
