//! Identifiers for matches, nodes, sessions and users (spec §3).

use std::fmt;
use uuid::Uuid;

/// Monotonic tick counter. Starts at 0 on match construction.
pub type Tick = u64;

/// Names the process that authoritatively owns a match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fresh 128-bit match identifier, unique process-wide for the lifetime
/// of the match (a `Stopped` match's id is never reused — spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchId(Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the hex form used by `Display`/`parse` round-trips and by
    /// the opaque-string encoding below.
    fn from_hex(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lowercase hex, no hyphens: DNS-safe per spec §6.
        write!(f, "{}", self.0.simple())
    }
}

/// The `(match_id, node_id)` pair, projected into a single opaque string
/// `<match_id>.<node>` for external use (spec §3, §6).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatchAddress {
    pub match_id: MatchId,
    pub node: NodeId,
}

impl MatchAddress {
    pub fn new(match_id: MatchId, node: NodeId) -> Self {
        Self { match_id, node }
    }

    /// Parse the opaque `<match_id>.<node>` string produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (id_part, node_part) = s.split_once('.')?;
        let match_id = MatchId::from_hex(id_part)?;
        Some(Self {
            match_id,
            node: NodeId::new(node_part),
        })
    }
}

impl fmt::Display for MatchAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.match_id, self.node)
    }
}

/// Identifies a user account (stable across sessions).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one client session. A user may hold multiple concurrent
/// sessions (spec §3: "the same user may have multiple presences across
/// sessions").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_address_round_trips_through_display() {
        let addr = MatchAddress::new(MatchId::new(), NodeId::new("node-a"));
        let rendered = addr.to_string();
        let parsed = MatchAddress::parse(&rendered).expect("parses back");
        assert_eq!(parsed, addr);
    }

    #[test]
    fn match_id_display_is_lowercase_hex_no_hyphens() {
        let id = MatchId::new();
        let s = id.to_string();
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(!s.contains('-'));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(MatchAddress::parse("not-an-address").is_none());
        assert!(MatchAddress::parse("zz.node").is_none());
    }
}
