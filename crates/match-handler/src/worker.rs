//! The per-match tick loop (spec §4.D). Grounded on
//! `crates/sim_server/src/tick_loop.rs` (`tokio::time::interval` +
//! `MissedTickBehavior::Skip` + a shutdown check each pass), generalized
//! from a bare timer-or-shutdown loop into the spec's 3-way priority
//! select (`stop_signal > tick_trigger > call_queue`) with call-queue
//! draining folded in.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use join_coordinator::{JoinMarkerTable, JoinVerdict};
use match_core::{
    validate, CoreValue, MatchId, NodeId, Presence, Stream, Tick,
};
use presence::PresenceTracker;
use router::MessageRouter;
use script_host::{Dispatcher, HookOutcome, MatchContext, MatchModule};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::calls::Call;
use crate::queues::InputQueue;
use crate::state::{HandlerStatus, StatusCell, StopSignal};

pub struct WorkerConfig {
    pub marker_deadline_ms: u64,
}

pub struct Worker {
    pub(crate) id: MatchId,
    pub(crate) node: NodeId,
    pub(crate) stream: Stream,
    pub(crate) tick_rate: u32,
    pub(crate) module_name: String,
    pub(crate) module: Box<dyn MatchModule>,
    pub(crate) env: std::collections::BTreeMap<String, String>,
    pub(crate) game_state: CoreValue,
    pub(crate) markers: JoinMarkerTable,
    pub(crate) pending_leavers: VecDeque<Presence>,
    pub(crate) call_rx: mpsc::Receiver<Call>,
    pub(crate) input_queue: Arc<InputQueue>,
    pub(crate) tracker: Arc<PresenceTracker>,
    pub(crate) router: Arc<MessageRouter>,
    pub(crate) label: Arc<RwLock<String>>,
    pub(crate) tick: Arc<AtomicU64>,
    pub(crate) status: Arc<StatusCell>,
    pub(crate) stop: Arc<StopSignal>,
    pub(crate) config: WorkerConfig,
    pub(crate) on_stopped: Box<dyn Fn(MatchId) + Send + Sync>,
}

impl Worker {
    fn ctx(&self) -> MatchContext {
        MatchContext {
            match_id: self.id.to_string(),
            node: self.node.to_string(),
            tick_rate: self.tick_rate,
            label: self.label.read().expect("label poisoned").clone(),
            env: self.env.clone(),
        }
    }

    fn current_tick(&self) -> Tick {
        self.tick.load(Ordering::Relaxed)
    }

    /// Flush buffered dispatcher effects (spec §4.C, §4.D step 4):
    /// broadcasts fan out through the Router in emission order; kicks
    /// resolve to full presences and join `pending_leavers`; a label
    /// update replaces the listing label.
    fn flush_dispatcher(&mut self, dispatcher: &mut Dispatcher) {
        let effects = dispatcher.drain();

        for broadcast in effects.broadcasts {
            let envelope = match_core::Envelope::MatchData(match_core::MatchDataEnvelope {
                op_code: broadcast.op_code,
                data: broadcast.data,
                sender: broadcast.sender,
            });
            match broadcast.filter_presences {
                Some(targets) => self.router.send_to_presences(&targets, envelope, broadcast.reliable),
                None => self.router.send_to_stream(&self.stream, envelope, broadcast.reliable),
            }
        }

        if !effects.kicks.is_empty() {
            let present = self.tracker.list_by_stream(&self.stream, true, true);
            for kicked in effects.kicks {
                for candidate in present.iter().filter(|p| p.user_id == kicked.user_id) {
                    self.pending_leavers.push_back(candidate.clone());
                }
            }
        }

        if let Some(new_label) = effects.label_update {
            *self.label.write().expect("label poisoned") = new_label;
        }
    }

    /// Invoke `leave` for everything queued in `pending_leavers`,
    /// untracking each presence from the tracker at the moment the hook
    /// is dispatched (spec invariant 2: presences contains a session
    /// only through `[confirm, leave_dispatch)`).
    async fn run_leave(&mut self) {
        if self.pending_leavers.is_empty() {
            return;
        }
        let leavers: Vec<Presence> = self.pending_leavers.drain(..).collect();
        for presence in &leavers {
            self.tracker.untrack(&self.stream, &presence.key());
        }

        let ctx = self.ctx();
        let mut dispatcher = Dispatcher::new();
        let state = self.game_state.clone();
        let outcome = self
            .module
            .leave(&ctx, &mut dispatcher, self.current_tick(), state, &leavers);
        self.flush_dispatcher(&mut dispatcher);

        match outcome {
            Ok(HookOutcome::Continue(result)) => {
                self.game_state = result.state;
            }
            Ok(HookOutcome::EndOfReturns) => {
                tracing::info!(match_id = %self.id, "leave hook returned end-of-returns, stopping");
                self.status.set(HandlerStatus::Stopping);
            }
            Err(fault) => {
                tracing::warn!(match_id = %self.id, tick = self.current_tick(), module = %self.module_name, error = %fault, "leave hook faulted");
                self.status.set(HandlerStatus::Stopping);
            }
        }
    }

    async fn run_loop_tick(&mut self) {
        let messages = self.input_queue.drain();
        let ctx = self.ctx();
        let mut dispatcher = Dispatcher::new();
        let state = self.game_state.clone();
        let tick = self.current_tick();
        let outcome = self.module.loop_tick(&ctx, &mut dispatcher, tick, state, &messages);
        self.flush_dispatcher(&mut dispatcher);

        match outcome {
            Ok(HookOutcome::Continue(result)) => {
                self.game_state = result.state;
            }
            Ok(HookOutcome::EndOfReturns) => {
                tracing::info!(match_id = %self.id, tick, "loop hook returned end-of-returns, stopping");
                self.status.set(HandlerStatus::Stopping);
            }
            Err(fault) => {
                tracing::warn!(match_id = %self.id, tick, module = %self.module_name, error = %fault, "loop hook faulted");
                self.status.set(HandlerStatus::Stopping);
            }
        }
    }

    /// One full tick pass (spec §4.D steps 1-6).
    async fn run_tick(&mut self) {
        self.run_leave().await;
        if self.status.get() == HandlerStatus::Stopping {
            return;
        }

        self.run_loop_tick().await;

        self.tick.fetch_add(1, Ordering::Relaxed);
        let new_tick = self.current_tick();
        let expired = self.markers.expire_up_to(new_tick);
        for presence in expired {
            self.pending_leavers.push_back(presence);
        }
    }

    async fn handle_call(&mut self, call: Call) {
        match call {
            Call::JoinAttempt(request) => self.handle_join_attempt(request).await,
            Call::Confirm(key) => {
                if let Some(presence) = self.markers.confirm(&key) {
                    self.tracker.track(self.stream.clone(), presence, false);
                }
            }
            Call::Leave(presence) => self.pending_leavers.push_back(presence),
            Call::LabelUpdate(new_label) => {
                if validate::validate_label(&new_label).is_ok() {
                    *self.label.write().expect("label poisoned") = new_label;
                }
            }
        }
    }

    async fn handle_join_attempt(&mut self, request: join_coordinator::JoinAttemptRequest) {
        let ctx = self.ctx();
        let mut dispatcher = Dispatcher::new();
        let state = self.game_state.clone();
        let tick = self.current_tick();
        let outcome = self.module.join_attempt(
            &ctx,
            &mut dispatcher,
            tick,
            state,
            &request.presence,
            &request.metadata,
        );
        self.flush_dispatcher(&mut dispatcher);

        let label = self.label.read().expect("label poisoned").clone();
        let verdict = match outcome {
            Ok(HookOutcome::Continue(result)) => {
                self.game_state = result.state;
                if result.allow {
                    self.markers.approve(
                        request.presence,
                        tick,
                        self.tick_rate,
                        self.config.marker_deadline_ms,
                    );
                }
                JoinVerdict {
                    allow: result.allow,
                    reason: result.reject_reason,
                    label,
                }
            }
            Ok(HookOutcome::EndOfReturns) => {
                tracing::info!(match_id = %self.id, tick, "join_attempt returned end-of-returns, stopping");
                self.status.set(HandlerStatus::Stopping);
                JoinVerdict {
                    allow: false,
                    reason: Some("match stopping".to_string()),
                    label,
                }
            }
            Err(fault) => {
                tracing::warn!(match_id = %self.id, tick, module = %self.module_name, error = %fault, "join_attempt hook faulted");
                self.status.set(HandlerStatus::Stopping);
                JoinVerdict {
                    allow: false,
                    reason: Some(fault.to_string()),
                    label,
                }
            }
        };

        let _ = request.reply.send(verdict);
    }

    async fn shutdown(mut self) {
        self.status.set(HandlerStatus::Stopping);
        self.call_rx.close();
        while let Ok(call) = self.call_rx.try_recv() {
            if let Call::JoinAttempt(request) = call {
                let label = self.label.read().expect("label poisoned").clone();
                let _ = request.reply.send(JoinVerdict::timeout(label));
            }
        }
        self.tracker.untrack_by_stream(&self.stream);
        self.status.set(HandlerStatus::Stopped);
        (self.on_stopped)(self.id);
    }

    pub async fn run(mut self) {
        self.status.set(HandlerStatus::Running);
        let tick_duration = Duration::from_secs_f64(1.0 / self.tick_rate as f64);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.stop.is_set() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.stop.notified() => {
                    break;
                }

                _ = ticker.tick() => {
                    self.run_tick().await;
                    if self.status.get() == HandlerStatus::Stopping {
                        break;
                    }
                }

                maybe_call = self.call_rx.recv() => {
                    match maybe_call {
                        Some(call) => self.handle_call(call).await,
                        None => break,
                    }
                    if self.status.get() == HandlerStatus::Stopping {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
    }
}
