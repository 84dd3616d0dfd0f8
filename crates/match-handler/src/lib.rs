//! Constructs a match handler: runs `init` synchronously (spec §4.E
//! "runs `init` synchronously so that any error propagates to the
//! caller"), then spawns the worker task. Grounded on
//! `crates/server/src/server.rs`'s `create_match_with_players` (build
//! the host, wrap it in a handle, `spawn_tick_loop`, return the id) —
//! the one addition here is that `init` itself can fail, so it runs
//! before any task is spawned and before the handle is returned.

mod calls;
mod handle;
mod queues;
mod state;
mod worker;

use std::collections::VecDeque;
use std::sync::Arc;

use match_core::{validate, MatchCoreError, MatchId, NodeId, RuntimeConfig, Stream};
use presence::PresenceTracker;
use router::MessageRouter;
use script_host::{HookOutcome, MatchContext, MatchModule};
use tokio::sync::mpsc;

pub use calls::{Call, CallQueueOverflow};
pub use handle::{MatchDescriptor, MatchHandler};
pub use queues::InputQueue;
pub use state::HandlerStatus;
use worker::{Worker, WorkerConfig};

/// Builds a match's `init` context with a provisional `tick_rate`: the
/// real value is decided by `init`'s return, not known beforehand (spec
/// §4.C: `init` returns `(initial_state, tick_rate, label)`).
fn init_context(id: MatchId, node: &NodeId) -> MatchContext {
    MatchContext {
        match_id: id.to_string(),
        node: node.to_string(),
        tick_rate: 0,
        label: String::new(),
        env: std::collections::BTreeMap::new(),
    }
}

/// `CreateMatch` (spec §4.E): validates the module exists (the caller
/// resolves `module` via `script_host::ModuleRegistry` before calling
/// this), constructs a handler, runs `init` synchronously, then records
/// the handler and returns. Creation failure leaves no trace: nothing is
/// spawned and no handle escapes this function.
pub async fn create_match(
    node: NodeId,
    module_name: String,
    mut module: Box<dyn MatchModule>,
    params: match_core::CoreValue,
    config: RuntimeConfig,
    tracker: Arc<PresenceTracker>,
    router: Arc<MessageRouter>,
    on_stopped: Box<dyn Fn(MatchId) + Send + Sync>,
) -> Result<MatchHandler, MatchCoreError> {
    let id = MatchId::new();
    let stream = Stream::for_match(id, node.clone());

    let ctx = init_context(id, &node);
    let outcome = module
        .init(&ctx, &params)
        .map_err(|fault| MatchCoreError::InvalidArgument(fault.to_string()))?;

    let init_result = match outcome {
        HookOutcome::Continue(result) => result,
        HookOutcome::EndOfReturns => {
            return Err(MatchCoreError::InvalidArgument(
                "init returned no state".to_string(),
            ))
        }
    };

    validate::validate_tick_rate(init_result.tick_rate)?;
    validate::validate_label(&init_result.label)?;

    let (call_tx, call_rx) = mpsc::channel(config.match_call_queue_capacity);
    let input_queue = Arc::new(InputQueue::new(config.match_input_queue_capacity));

    let handler = MatchHandler::new(
        id,
        node.clone(),
        stream.clone(),
        init_result.tick_rate,
        module_name.clone(),
        init_result.label,
        call_tx,
        Arc::clone(&input_queue),
        Arc::clone(&tracker),
        std::time::Duration::from_millis(config.marker_deadline_ms),
    );

    let worker = Worker {
        id,
        node,
        stream,
        tick_rate: init_result.tick_rate,
        module_name,
        module,
        env: std::collections::BTreeMap::new(),
        game_state: init_result.state,
        markers: join_coordinator::JoinMarkerTable::new(),
        pending_leavers: VecDeque::new(),
        call_rx,
        input_queue,
        tracker,
        router,
        label: handler.label_cell(),
        tick: handler.tick_cell(),
        status: handler.status_cell(),
        stop: handler.stop_signal(),
        config: WorkerConfig {
            marker_deadline_ms: config.marker_deadline_ms,
        },
        on_stopped,
    };

    tokio::spawn(worker.run());

    Ok(handler)
}
