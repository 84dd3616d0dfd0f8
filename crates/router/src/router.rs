//! Message Router (spec §4.B): stateless fan-out. Looks up presences in
//! the Tracker, enqueues onto each presence's session outbound queue. The
//! router never blocks the caller on a per-session queue — a full queue
//! increments a drop counter and the send continues to the remaining
//! recipients. Outbound ordering is preserved per destination session,
//! never globally (spec §5).
//!
//! Grounded on the backpressure discipline of the teacher's
//! `EventBuffer` (`crates/server/src/events.rs`: fixed capacity, oldest
//! data silently superseded, no blocking) adapted from one ring buffer
//! per match to one bounded mpsc queue per session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use match_core::{Envelope, Presence, SessionId};
use presence::PresenceTracker;
use tokio::sync::mpsc;

/// What arrives in a session's outbound queue: the envelope plus whether
/// it was sent reliably. The spec defines "reliable" as "bypasses any
/// coalescing"; since this router performs no coalescing, reliable and
/// unreliable sends share the same drop-on-full behavior — the flag is
/// carried through for the transport layer (out of scope here) to act on.
#[derive(Clone, Debug)]
pub struct OutboundItem {
    pub envelope: Envelope,
    pub reliable: bool,
}

pub struct MessageRouter {
    tracker: Arc<PresenceTracker>,
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<OutboundItem>>>,
    drop_count: AtomicU64,
}

impl MessageRouter {
    pub fn new(tracker: Arc<PresenceTracker>) -> Self {
        Self {
            tracker,
            sessions: RwLock::new(HashMap::new()),
            drop_count: AtomicU64::new(0),
        }
    }

    /// Register a session's outbound queue. Replaces any prior
    /// registration for the same session (e.g. on reconnect).
    pub fn register_session(&self, session_id: SessionId, sender: mpsc::Sender<OutboundItem>) {
        self.sessions.write().expect("router sessions poisoned").insert(session_id, sender);
    }

    pub fn unregister_session(&self, session_id: &SessionId) {
        self.sessions.write().expect("router sessions poisoned").remove(session_id);
    }

    pub fn drop_count(&self) -> u64 {
        self.drop_count.load(Ordering::Relaxed)
    }

    /// Look up presences in the tracker and enqueue onto each one's
    /// session outbound queue.
    pub fn send_to_stream(&self, stream: &match_core::Stream, envelope: Envelope, reliable: bool) {
        let presences = self.tracker.list_by_stream(stream, true, true);
        self.send_to_presences(&presences, envelope, reliable);
    }

    /// Direct fan-out skipping the tracker lookup.
    pub fn send_to_presences(&self, presences: &[Presence], envelope: Envelope, reliable: bool) {
        let sessions = self.sessions.read().expect("router sessions poisoned");
        for presence in presences {
            let Some(sender) = sessions.get(&presence.session_id) else {
                // No transport registered for this session (e.g. a
                // presence tracked by another node) — not our concern,
                // not a drop.
                continue;
            };

            let item = OutboundItem {
                envelope: envelope.clone(),
                reliable,
            };

            if sender.try_send(item).is_err() {
                self.drop_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session = %presence.session_id, "router: outbound queue full, dropping envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_core::{MatchDataEnvelope, MatchId, NodeId, SessionId, Stream, UserId};
    use presence::NullEventSink;

    fn presence(session: &str) -> Presence {
        Presence {
            user_id: UserId::new("user"),
            session_id: SessionId::new(session),
            node_id: NodeId::new("node-a"),
            username: "user".to_string(),
            hidden: false,
            persistence: false,
            status: 0,
        }
    }

    fn envelope() -> Envelope {
        Envelope::MatchData(MatchDataEnvelope {
            op_code: 5,
            data: vec![0x01],
            sender: None,
        })
    }

    #[tokio::test]
    async fn delivers_to_registered_session() {
        let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
        let router = MessageRouter::new(Arc::clone(&tracker));
        let (tx, mut rx) = mpsc::channel(8);
        router.register_session(SessionId::new("sess-1"), tx);

        router.send_to_presences(&[presence("sess-1")], envelope(), true);

        let item = rx.recv().await.unwrap();
        assert!(item.reliable);
        assert_eq!(router.drop_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_increments_drop_counter_not_error() {
        let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
        let router = MessageRouter::new(Arc::clone(&tracker));
        let (tx, _rx) = mpsc::channel(1);
        router.register_session(SessionId::new("sess-1"), tx.clone());

        // Fill the queue, then overflow it twice.
        tx.try_send(OutboundItem { envelope: envelope(), reliable: false }).unwrap();
        router.send_to_presences(&[presence("sess-1")], envelope(), false);
        router.send_to_presences(&[presence("sess-1")], envelope(), false);

        assert_eq!(router.drop_count(), 2);
    }

    #[tokio::test]
    async fn send_to_stream_looks_up_tracker() {
        let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
        let router = MessageRouter::new(Arc::clone(&tracker));
        let stream = Stream::for_match(MatchId::new(), NodeId::new("node-a"));
        let p = presence("sess-1");
        tracker.track(stream.clone(), p.clone(), false);

        let (tx, mut rx) = mpsc::channel(8);
        router.register_session(p.session_id.clone(), tx);

        router.send_to_stream(&stream, envelope(), true);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn unregistered_session_is_not_a_drop() {
        let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
        let router = MessageRouter::new(Arc::clone(&tracker));
        router.send_to_presences(&[presence("sess-ghost")], envelope(), true);
        assert_eq!(router.drop_count(), 0);
    }
}
