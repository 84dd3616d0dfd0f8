//! The language-neutral `MatchModule` contract (spec §4.C): any
//! implementation must expose four hooks and honor the return protocol.
//! This is the dynamic analogue of `crates/core/src/game.rs`'s `Game`
//! trait — same tick-indexed pure-transition shape (`state_t ->
//! state_{t+1}`), dispatched through a loaded scripting runtime instead
//! of a compile-time generic parameter.

use match_core::{CoreValue, InboundMessage, Presence, Tick};

use crate::dispatcher::Dispatcher;

/// What `init` must return: `(initial_state, tick_rate, label)`.
#[derive(Clone, Debug)]
pub struct InitResult {
    pub state: CoreValue,
    pub tick_rate: u32,
    pub label: String,
}

/// What `join_attempt` must return: `(new_state, allow_bool, reject_reason?)`.
#[derive(Clone, Debug)]
pub struct JoinAttemptResult {
    pub state: CoreValue,
    pub allow: bool,
    pub reject_reason: Option<String>,
}

/// What `leave`/`loop` must return: `(new_state)`.
#[derive(Clone, Debug)]
pub struct LoopResult {
    pub state: CoreValue,
}

/// A hook returned no new state (or the sentinel "end-of-returns" value):
/// the match stops cleanly. A hook raised: the match stops with a fault
/// (carried as the error message).
#[derive(Debug)]
pub enum HookOutcome<T> {
    Continue(T),
    EndOfReturns,
}

#[derive(Debug)]
pub struct HookFault(pub String);

impl std::fmt::Display for HookFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "script hook fault: {}", self.0)
    }
}

impl std::error::Error for HookFault {}

pub type HookResult<T> = Result<HookOutcome<T>, HookFault>;

/// Read-only context handed to every hook (spec §4.C): "`match_id`,
/// `node`, `tick_rate`, `label`, and an environment map."
#[derive(Clone, Debug)]
pub struct MatchContext {
    pub match_id: String,
    pub node: String,
    pub tick_rate: u32,
    pub label: String,
    pub env: std::collections::BTreeMap<String, String>,
}

pub trait MatchModule: Send {
    fn init(&mut self, ctx: &MatchContext, params: &CoreValue) -> HookResult<InitResult>;

    fn join_attempt(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        presence: &Presence,
        metadata: &CoreValue,
    ) -> HookResult<JoinAttemptResult>;

    fn leave(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        leavers: &[Presence],
    ) -> HookResult<LoopResult>;

    fn loop_tick(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        messages: &[InboundMessage],
    ) -> HookResult<LoopResult>;
}
