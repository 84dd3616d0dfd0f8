//! Wire envelopes. The match runtime does not define the serialization
//! format of game data (spec §6): payloads are opaque bytes plus a 64-bit
//! `op_code`. Only the control envelopes (join, leave, match-data,
//! presence events) are structured.

use crate::presence::Presence;

/// An inbound message drained from a match's input queue for one tick
/// (spec §4.D step 1: "a snapshot list of `(sender_presence, op_code,
/// data)`").
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender: Presence,
    pub op_code: u64,
    pub data: Vec<u8>,
}

/// Outbound match-data payload, broadcast via the dispatcher/router.
#[derive(Clone, Debug)]
pub struct MatchDataEnvelope {
    pub op_code: u64,
    pub data: Vec<u8>,
    pub sender: Option<Presence>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceEventKind {
    Join,
    Leave,
}

#[derive(Clone, Debug)]
pub struct PresenceEventEnvelope {
    pub kind: PresenceEventKind,
    pub presences: Vec<Presence>,
}

/// The envelope variants the Router fans out (spec §3, §4.B).
#[derive(Clone, Debug)]
pub enum Envelope {
    MatchData(MatchDataEnvelope),
    Presence(PresenceEventEnvelope),
}
