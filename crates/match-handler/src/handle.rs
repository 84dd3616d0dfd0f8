//! The shared, cloneable handle to a live match (spec §3 "match handler
//! state"). Grounded on `crates/server/src/match_handle.rs`'s
//! `MatchHandle` — same `Arc<...>` + `Clone` shape exposing async
//! methods that hand work to the worker rather than mutating state
//! directly — generalized from a single `Arc<Mutex<MatchInner<G>>>` to
//! several narrower shared cells (label, tick, status) plus queues,
//! since here only the worker task ever touches `game_state` and
//! `join_markers` (spec §5: "no lock is held across a hook invocation").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use join_coordinator::{JoinAttemptRequest, JoinVerdict};
use match_core::{MatchCoreError, MatchId, NodeId, Presence, PresenceKey, Stream, Tick};
use presence::PresenceTracker;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::calls::{Call, CallQueueOverflow};
use crate::queues::InputQueue;
use crate::state::{HandlerStatus, StatusCell, StopSignal};

/// Read-only descriptor for `GetMatch`/`ListMatches` (spec §4.E).
#[derive(Clone, Debug)]
pub struct MatchDescriptor {
    pub match_id: MatchId,
    pub node: NodeId,
    pub authoritative: bool,
    pub label: String,
    pub size: usize,
    pub tick_rate: u32,
    pub module_name: String,
}

pub struct MatchHandler {
    pub id: MatchId,
    pub node: NodeId,
    pub stream: Stream,
    pub tick_rate: u32,
    pub module_name: String,
    label: Arc<RwLock<String>>,
    tick: Arc<AtomicU64>,
    status: Arc<StatusCell>,
    stop: Arc<StopSignal>,
    call_tx: mpsc::Sender<Call>,
    input_queue: Arc<InputQueue>,
    tracker: Arc<PresenceTracker>,
    join_attempt_deadline: Duration,
}

impl Clone for MatchHandler {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            node: self.node.clone(),
            stream: self.stream.clone(),
            tick_rate: self.tick_rate,
            module_name: self.module_name.clone(),
            label: Arc::clone(&self.label),
            tick: Arc::clone(&self.tick),
            status: Arc::clone(&self.status),
            stop: Arc::clone(&self.stop),
            call_tx: self.call_tx.clone(),
            input_queue: Arc::clone(&self.input_queue),
            tracker: Arc::clone(&self.tracker),
            join_attempt_deadline: self.join_attempt_deadline,
        }
    }
}

impl MatchHandler {
    pub(crate) fn new(
        id: MatchId,
        node: NodeId,
        stream: Stream,
        tick_rate: u32,
        module_name: String,
        initial_label: String,
        call_tx: mpsc::Sender<Call>,
        input_queue: Arc<InputQueue>,
        tracker: Arc<PresenceTracker>,
        join_attempt_deadline: Duration,
    ) -> Self {
        Self {
            id,
            node,
            stream,
            tick_rate,
            module_name,
            label: Arc::new(RwLock::new(initial_label)),
            tick: Arc::new(AtomicU64::new(0)),
            status: Arc::new(StatusCell::new()),
            stop: Arc::new(StopSignal::new()),
            call_tx,
            input_queue,
            tracker,
            join_attempt_deadline,
        }
    }

    pub(crate) fn label_cell(&self) -> Arc<RwLock<String>> {
        Arc::clone(&self.label)
    }

    pub(crate) fn tick_cell(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.tick)
    }

    pub(crate) fn status_cell(&self) -> Arc<StatusCell> {
        Arc::clone(&self.status)
    }

    pub(crate) fn stop_signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    pub fn status(&self) -> HandlerStatus {
        self.status.get()
    }

    pub fn tick(&self) -> Tick {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn input_dropped_count(&self) -> u64 {
        self.input_queue.dropped_count()
    }

    pub fn descriptor(&self) -> MatchDescriptor {
        MatchDescriptor {
            match_id: self.id,
            node: self.node.clone(),
            authoritative: true,
            label: self.label.read().expect("label poisoned").clone(),
            size: self.tracker.count_by_stream(&self.stream),
            tick_rate: self.tick_rate,
            module_name: self.module_name.clone(),
        }
    }

    /// `RouteData` (spec §4.E): non-blocking, drop-oldest-on-overflow.
    pub fn route_data(&self, message: match_core::InboundMessage) {
        self.input_queue.push(message);
    }

    /// `Stop()` (spec §5): idempotent. Returns `true` the first time.
    pub fn stop(&self) -> bool {
        self.stop.request()
    }

    fn submit_call(&self, call: Call) -> Result<(), CallQueueOverflow> {
        self.call_tx.try_send(call).map_err(|_| {
            // A full call queue is the fatal-stop condition (spec §4.D
            // "Call-queue overflow"); requesting stop here, rather than
            // only inside the worker, ensures it fires even if the
            // worker is wedged on something other than its own select.
            self.stop.request();
            CallQueueOverflow
        })
    }

    /// `JoinAttempt` (spec §4.E, §4.F step 1): synchronous from the
    /// caller's perspective. A full call queue yields `timeout`
    /// immediately; a call queue that accepts the request but is too slow
    /// to drain it (the worker wedged on a long hook) also yields
    /// `timeout` once `join_attempt_deadline` elapses, rather than
    /// blocking the caller indefinitely (spec §5: "external join attempts
    /// carry a deadline").
    pub async fn join_attempt(&self, presence: Presence, metadata: match_core::CoreValue) -> JoinVerdict {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = JoinAttemptRequest {
            presence,
            metadata,
            reply: reply_tx,
        };
        let label = || self.label.read().expect("label poisoned").clone();
        if self.submit_call(Call::JoinAttempt(request)).is_err() {
            return JoinVerdict::timeout(label());
        }
        match timeout(self.join_attempt_deadline, reply_rx).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(_)) | Err(_) => JoinVerdict::timeout(label()),
        }
    }

    /// `Mark` (spec §4.F step 2): client signals join completion.
    pub fn confirm(&self, key: PresenceKey) -> Result<(), MatchCoreError> {
        self.submit_call(Call::Confirm(key))
            .map_err(|_| MatchCoreError::Unavailable("call queue full".to_string()))
    }

    pub fn leave(&self, presence: Presence) -> Result<(), MatchCoreError> {
        self.submit_call(Call::Leave(presence))
            .map_err(|_| MatchCoreError::Unavailable("call queue full".to_string()))
    }

    /// `Kick(stream, presences)` (spec §4.E): enqueues each presence as a
    /// leaver, same path a module-initiated `dispatcher:kick` resolves
    /// to internally.
    pub fn kick(&self, presences: &[Presence]) -> Result<(), MatchCoreError> {
        for presence in presences {
            self.leave(presence.clone())?;
        }
        Ok(())
    }

    pub fn label_update(&self, new_label: String) -> Result<(), MatchCoreError> {
        self.submit_call(Call::LabelUpdate(new_label))
            .map_err(|_| MatchCoreError::Unavailable("call queue full".to_string()))
    }
}
