use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use match_core::{CoreValue, InboundMessage, NodeId, Presence, RuntimeConfig, SessionId, UserId};
use match_handler::{create_match, HandlerStatus};
use presence::{NullEventSink, PresenceTracker};
use router::MessageRouter;
use script_host::{
    Dispatcher, HookOutcome, HookResult, InitResult, JoinAttemptResult, LoopResult, MatchContext,
    MatchModule,
};

fn presence(session: &str) -> Presence {
    Presence {
        user_id: UserId::new(format!("user-{session}")),
        session_id: SessionId::new(session),
        node_id: NodeId::new("node-a"),
        username: session.to_string(),
        hidden: false,
        persistence: false,
        status: 0,
    }
}

/// Allows every join, echoes nothing on its own `loop`, and records every
/// presence `leave` is called with (spec §8 scenario 2's "marker expiry
/// delivers the presence to `leave`").
struct RecordingModule {
    tick_rate: u32,
    left: Arc<Mutex<Vec<String>>>,
}

impl MatchModule for RecordingModule {
    fn init(&mut self, _ctx: &MatchContext, _params: &CoreValue) -> HookResult<InitResult> {
        Ok(HookOutcome::Continue(InitResult {
            state: CoreValue::Nil,
            tick_rate: self.tick_rate,
            label: "room".to_string(),
        }))
    }

    fn join_attempt(
        &mut self,
        _ctx: &MatchContext,
        _dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        _presence: &Presence,
        _metadata: &CoreValue,
    ) -> HookResult<JoinAttemptResult> {
        Ok(HookOutcome::Continue(JoinAttemptResult {
            state,
            allow: true,
            reject_reason: None,
        }))
    }

    fn leave(
        &mut self,
        _ctx: &MatchContext,
        _dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        leavers: &[Presence],
    ) -> HookResult<LoopResult> {
        let mut left = self.left.lock().unwrap();
        for presence in leavers {
            left.push(presence.username.clone());
        }
        Ok(HookOutcome::Continue(LoopResult { state }))
    }

    fn loop_tick(
        &mut self,
        _ctx: &MatchContext,
        _dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        _messages: &[match_core::InboundMessage],
    ) -> HookResult<LoopResult> {
        Ok(HookOutcome::Continue(LoopResult { state }))
    }
}

/// Echoes every inbound message back to the stream, so a test can read
/// off the router which op codes actually survived the input queue.
struct EchoModule;

impl MatchModule for EchoModule {
    fn init(&mut self, _ctx: &MatchContext, _params: &CoreValue) -> HookResult<InitResult> {
        Ok(HookOutcome::Continue(InitResult {
            state: CoreValue::Nil,
            tick_rate: 20,
            label: "room".to_string(),
        }))
    }

    fn join_attempt(
        &mut self,
        _ctx: &MatchContext,
        _dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        _presence: &Presence,
        _metadata: &CoreValue,
    ) -> HookResult<JoinAttemptResult> {
        Ok(HookOutcome::Continue(JoinAttemptResult {
            state,
            allow: true,
            reject_reason: None,
        }))
    }

    fn leave(
        &mut self,
        _ctx: &MatchContext,
        _dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        _leavers: &[Presence],
    ) -> HookResult<LoopResult> {
        Ok(HookOutcome::Continue(LoopResult { state }))
    }

    fn loop_tick(
        &mut self,
        _ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        _tick: match_core::Tick,
        state: CoreValue,
        messages: &[match_core::InboundMessage],
    ) -> HookResult<LoopResult> {
        for m in messages {
            dispatcher.broadcast(m.op_code, m.data.clone(), None, Some(m.sender.clone()), true);
        }
        Ok(HookOutcome::Continue(LoopResult { state }))
    }
}

fn harness() -> (Arc<PresenceTracker>, Arc<MessageRouter>) {
    let tracker = Arc::new(PresenceTracker::new(Box::new(NullEventSink)));
    let router = Arc::new(MessageRouter::new(Arc::clone(&tracker)));
    (tracker, router)
}

/// A join that is approved but never confirmed outlives its marker
/// deadline and is handed to `leave` the same way an expired real client
/// would be (spec §4.D step 6, §8 scenario 2).
#[tokio::test(start_paused = true)]
async fn unconfirmed_join_expires_into_a_leave() {
    let (tracker, router) = harness();
    let left = Arc::new(Mutex::new(Vec::new()));

    let handler = create_match(
        NodeId::new("node-a"),
        "recording".to_string(),
        Box::new(RecordingModule {
            tick_rate: 20,
            left: Arc::clone(&left),
        }),
        CoreValue::Nil,
        RuntimeConfig {
            marker_deadline_ms: 250,
            ..RuntimeConfig::default()
        },
        Arc::clone(&tracker),
        Arc::clone(&router),
        Box::new(|_id| {}),
    )
    .await
    .unwrap();

    let joiner = presence("sess-a");
    let verdict = handler.join_attempt(joiner.clone(), CoreValue::Nil).await;
    assert!(verdict.allow);

    // tick_rate=20 + marker_deadline_ms=250 -> expiry_tick = 5; run a
    // comfortable margin of ticks past that so the expiry is collected
    // and the following `leave` dispatch has run.
    for _ in 0..8 {
        tokio::time::advance(Duration::from_millis(55)).await;
        tokio::task::yield_now().await;
    }

    assert_eq!(left.lock().unwrap().as_slice(), &[joiner.username.clone()]);
}

/// Input-queue overflow drops the oldest entries rather than blocking
/// the caller; `loop` only ever sees what survives (spec §4.D "Input
/// overflow").
#[tokio::test(start_paused = true)]
async fn input_queue_backpressure_drops_oldest_and_keeps_running() {
    let (tracker, router) = harness();

    let handler = create_match(
        NodeId::new("node-a"),
        "echo".to_string(),
        Box::new(EchoModule),
        CoreValue::Nil,
        RuntimeConfig {
            match_input_queue_capacity: 3,
            ..RuntimeConfig::default()
        },
        Arc::clone(&tracker),
        Arc::clone(&router),
        Box::new(|_id| {}),
    )
    .await
    .unwrap();

    let sender = presence("sess-a");
    let receiver = presence("sess-b");
    let (tx_a, mut rx_a) = tokio::sync::mpsc::channel(8);
    let (tx_b, mut rx_b) = tokio::sync::mpsc::channel(8);
    router.register_session(sender.session_id.clone(), tx_a);
    router.register_session(receiver.session_id.clone(), tx_b);

    for p in [&sender, &receiver] {
        assert!(handler.join_attempt(p.clone(), CoreValue::Nil).await.allow);
        handler.confirm(p.key()).unwrap();
    }

    for op_code in 0..10u64 {
        handler.route_data(InboundMessage {
            sender: sender.clone(),
            op_code,
            data: vec![],
        });
    }
    assert_eq!(handler.input_dropped_count(), 7);

    tokio::time::advance(Duration::from_millis(55)).await;
    tokio::task::yield_now().await;

    let mut seen = Vec::new();
    while let Ok(item) = rx_b.try_recv() {
        if let match_core::Envelope::MatchData(data) = item.envelope {
            seen.push(data.op_code);
        }
    }
    assert_eq!(seen, vec![7, 8, 9]);
    let _ = rx_a.try_recv();
}

/// A call queue that fills up faster than the worker can drain it is a
/// fatal condition: the handler stops itself rather than accepting calls
/// it cannot service (spec §4.D "Call-queue overflow").
#[tokio::test(start_paused = true)]
async fn call_queue_overflow_stops_the_match() {
    let (tracker, router) = harness();
    let stopped = Arc::new(AtomicU64::new(0));
    let stopped_clone = Arc::clone(&stopped);

    let handler = create_match(
        NodeId::new("node-a"),
        "echo".to_string(),
        Box::new(EchoModule),
        CoreValue::Nil,
        RuntimeConfig {
            match_call_queue_capacity: 1,
            ..RuntimeConfig::default()
        },
        Arc::clone(&tracker),
        Arc::clone(&router),
        Box::new(move |_id| {
            stopped_clone.fetch_add(1, Ordering::Relaxed);
        }),
    )
    .await
    .unwrap();

    // Flood the call queue synchronously, with no `.await` in between, so
    // the worker never gets a turn to drain it first.
    let overflowed = (0..8)
        .map(|i| handler.leave(presence(&format!("sess-{i}"))))
        .filter(|r| r.is_err())
        .count();
    assert!(overflowed > 0);

    for _ in 0..5 {
        tokio::time::advance(Duration::from_millis(55)).await;
        tokio::task::yield_now().await;
    }

    assert_eq!(handler.status(), HandlerStatus::Stopped);
    assert_eq!(stopped.load(Ordering::Relaxed), 1);
}

/// `Stop()` is idempotent: only the first call reports that it actually
/// requested shutdown, and the handler transitions to `Stopped` exactly
/// once regardless of how many callers race to stop it (spec §5).
#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_shuts_down_once() {
    let (tracker, router) = harness();
    let stopped = Arc::new(AtomicU64::new(0));
    let stopped_clone = Arc::clone(&stopped);

    let handler = create_match(
        NodeId::new("node-a"),
        "echo".to_string(),
        Box::new(EchoModule),
        CoreValue::Nil,
        RuntimeConfig::default(),
        Arc::clone(&tracker),
        Arc::clone(&router),
        Box::new(move |_id| {
            stopped_clone.fetch_add(1, Ordering::Relaxed);
        }),
    )
    .await
    .unwrap();

    assert!(handler.stop());
    assert!(!handler.stop());
    assert!(!handler.stop());

    for _ in 0..3 {
        tokio::time::advance(Duration::from_millis(55)).await;
        tokio::task::yield_now().await;
    }

    assert_eq!(handler.status(), HandlerStatus::Stopped);
    assert_eq!(stopped.load(Ordering::Relaxed), 1);
}
