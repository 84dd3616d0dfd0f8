//! Join markers (spec §3, §4.F): `(presence, expiry_tick)` recording that
//! a join was approved but the client has not yet signaled completion.
//!
//! Markers and presences are disjoint at all times (spec invariant 4):
//! this table only ever holds markers, never confirmed presences, and
//! `confirm` is the single path that moves a key out of this table.

use std::collections::HashMap;

use match_core::{Micros, Presence, PresenceKey, Tick};

#[derive(Clone, Debug)]
pub struct JoinMarker {
    pub presence: Presence,
    pub expiry_tick: Tick,
}

impl JoinMarker {
    /// `expiry_tick = current_tick + tick_rate * (marker_deadline_ms / 1000)`.
    pub fn expiry_for(current_tick: Tick, tick_rate: u32, marker_deadline_ms: u64) -> Tick {
        current_tick + Micros::from_millis(marker_deadline_ms as u32).to_ticks(tick_rate)
    }
}

#[derive(Default)]
pub struct JoinMarkerTable {
    markers: HashMap<PresenceKey, JoinMarker>,
}

impl JoinMarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an approved join. Overwrites any existing marker for the
    /// same key (a re-attempt resets the deadline).
    pub fn approve(&mut self, presence: Presence, current_tick: Tick, tick_rate: u32, marker_deadline_ms: u64) {
        let expiry_tick = JoinMarker::expiry_for(current_tick, tick_rate, marker_deadline_ms);
        self.markers.insert(presence.key(), JoinMarker { presence, expiry_tick });
    }

    /// Remove the marker for `key`, returning its presence if one
    /// existed. Idempotent: a double-confirm, or a confirm with no
    /// marker, is a no-op (returns `None` the second time).
    pub fn confirm(&mut self, key: &PresenceKey) -> Option<Presence> {
        self.markers.remove(key).map(|m| m.presence)
    }

    pub fn contains(&self, key: &PresenceKey) -> bool {
        self.markers.contains_key(key)
    }

    /// Collect and remove every marker whose `expiry_tick <= tick` (spec
    /// §4.D step 6). Their presences are synthesized into the next
    /// `leave` call by the caller (match-handler).
    pub fn expire_up_to(&mut self, tick: Tick) -> Vec<Presence> {
        let expired_keys: Vec<PresenceKey> = self
            .markers
            .iter()
            .filter(|(_, m)| m.expiry_tick <= tick)
            .map(|(k, _)| k.clone())
            .collect();

        expired_keys
            .into_iter()
            .filter_map(|k| self.markers.remove(&k).map(|m| m.presence))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
