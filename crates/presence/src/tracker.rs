//! Presence Tracker (spec §4.A): source of truth for "who is present on
//! which logical stream".
//!
//! Concurrency model (spec §5): "A single striped map keyed by stream
//! hash; each stripe guarded by a read/write lock. Reads (list/count/
//! exists) must not block on each other. Writes to different streams must
//! not serialize." We stripe on `Stream`'s hash across a fixed number of
//! `RwLock`-guarded shards, generalizing the single-channel `RwLock<HashMap
//! <String, PresenceState>>` in the `eshanized-AeroDB` presence tracker to
//! many streams.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use match_core::{Presence, PresenceKey, Stream};

/// Emits join/leave events for non-hidden presence changes (spec §4.A:
/// "hidden presences produce no event but are still listed"). Implemented
/// by the wiring layer on top of the Message Router, kept as a trait here
/// so `presence` does not depend on `router` (router depends on presence,
/// not the reverse).
pub trait PresenceEventSink: Send + Sync {
    fn joined(&self, stream: &Stream, presences: &[Presence]);
    fn left(&self, stream: &Stream, presences: &[Presence]);
}

/// A sink that drops every event — useful for tests and for call sites
/// that only care about tracker state.
pub struct NullEventSink;

impl PresenceEventSink for NullEventSink {
    fn joined(&self, _stream: &Stream, _presences: &[Presence]) {}
    fn left(&self, _stream: &Stream, _presences: &[Presence]) {}
}

#[derive(Default)]
struct StreamEntry {
    /// Stable insertion order, for O(n) ordered iteration.
    ordered: Vec<Presence>,
    /// O(1) membership test / lookup by key.
    index: HashMap<PresenceKey, usize>,
    count: AtomicUsize,
}

impl StreamEntry {
    fn insert_or_update(&mut self, presence: Presence) -> bool {
        if let Some(&idx) = self.index.get(&presence.key()) {
            self.ordered[idx] = presence;
            false
        } else {
            let idx = self.ordered.len();
            self.index.insert(presence.key(), idx);
            self.ordered.push(presence);
            self.count.fetch_add(1, Ordering::Relaxed);
            true
        }
    }

    fn remove(&mut self, key: &PresenceKey) -> Option<Presence> {
        let idx = self.index.remove(key)?;
        let removed = self.ordered.remove(idx);
        // Reindex everything after the removed slot.
        for (k, v) in self.index.iter_mut() {
            if *v > idx {
                *v -= 1;
            }
            let _ = k;
        }
        self.count.fetch_sub(1, Ordering::Relaxed);
        Some(removed)
    }
}

const STRIPE_COUNT: usize = 32;

pub struct PresenceTracker {
    stripes: Vec<RwLock<HashMap<Stream, StreamEntry>>>,
    sink: Box<dyn PresenceEventSink>,
}

pub struct TrackOutcome {
    pub accepted: bool,
    pub newly_tracked: bool,
}

impl PresenceTracker {
    pub fn new(sink: Box<dyn PresenceEventSink>) -> Self {
        Self {
            stripes: (0..STRIPE_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            sink,
        }
    }

    fn stripe_for(&self, stream: &Stream) -> &RwLock<HashMap<Stream, StreamEntry>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        stream.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.stripes.len();
        &self.stripes[idx]
    }

    /// `accepted=false` if the session is closing (closing sessions are
    /// rejected by the caller before tracking — spec §4.A). `newly_tracked
    /// =false` if an identical `(session, stream, user)` already existed
    /// (update only).
    pub fn track(&self, stream: Stream, presence: Presence, session_closing: bool) -> TrackOutcome {
        if session_closing {
            return TrackOutcome {
                accepted: false,
                newly_tracked: false,
            };
        }

        let hidden = presence.hidden;
        let newly_tracked = {
            let mut guard = self.stripe_for(&stream).write().expect("presence stripe poisoned");
            let entry = guard.entry(stream.clone()).or_default();
            entry.insert_or_update(presence.clone())
        };

        if newly_tracked && !hidden {
            self.sink.joined(&stream, std::slice::from_ref(&presence));
        }

        TrackOutcome {
            accepted: true,
            newly_tracked,
        }
    }

    /// Idempotent: untracking an absent presence is a no-op.
    pub fn untrack(&self, stream: &Stream, key: &PresenceKey) {
        let removed = {
            let mut guard = self.stripe_for(stream).write().expect("presence stripe poisoned");
            guard.get_mut(stream).and_then(|entry| entry.remove(key))
        };

        if let Some(presence) = removed {
            if !presence.hidden {
                self.sink.left(stream, std::slice::from_ref(&presence));
            }
        }
    }

    /// Bulk remove, used on match stop.
    pub fn untrack_by_stream(&self, stream: &Stream) {
        let removed = {
            let mut guard = self.stripe_for(stream).write().expect("presence stripe poisoned");
            guard.remove(stream)
        };

        if let Some(entry) = removed {
            let visible: Vec<Presence> = entry.ordered.into_iter().filter(|p| !p.hidden).collect();
            if !visible.is_empty() {
                self.sink.left(stream, &visible);
            }
        }
    }

    pub fn get_local_by_session_stream_user(&self, stream: &Stream, key: &PresenceKey) -> Option<Presence> {
        let guard = self.stripe_for(stream).read().expect("presence stripe poisoned");
        let entry = guard.get(stream)?;
        let idx = *entry.index.get(key)?;
        entry.ordered.get(idx).cloned()
    }

    /// Snapshot in stable insertion order.
    pub fn list_by_stream(&self, stream: &Stream, include_hidden: bool, include_visible: bool) -> Vec<Presence> {
        let guard = self.stripe_for(stream).read().expect("presence stripe poisoned");
        let Some(entry) = guard.get(stream) else {
            return Vec::new();
        };
        entry
            .ordered
            .iter()
            .filter(|p| if p.hidden { include_hidden } else { include_visible })
            .cloned()
            .collect()
    }

    pub fn count_by_stream(&self, stream: &Stream) -> usize {
        let guard = self.stripe_for(stream).read().expect("presence stripe poisoned");
        guard.get(stream).map(|e| e.count.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn stream_exists(&self, stream: &Stream) -> bool {
        let guard = self.stripe_for(stream).read().expect("presence stripe poisoned");
        guard.contains_key(stream)
    }
}
