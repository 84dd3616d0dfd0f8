//! A `MatchModule` backed by an embedded Lua 5.4 runtime.
//!
//! Each match gets its own `Lua` instance (spec §4.C: "modules do not
//! share interpreter state across matches"), so `LuaMatchModule::load`
//! is called once per match, not once per module source.
//!
//! Hooks are plain Lua globals (`match_init`, `match_join_attempt`,
//! `match_leave`, `match_loop`) called positionally; state round-trips
//! through `CoreValue` via `crate::convert`. The dispatcher is exposed as
//! a userdata so scripts call `dispatcher:broadcast(...)`,
//! `dispatcher:kick(...)`, `dispatcher:match_label_update(...)` directly.

use std::cell::RefCell;
use std::rc::Rc;

use match_core::{CoreValue, InboundMessage, Presence, Tick};
use mlua::{Lua, UserData, UserDataMethods, Value as LuaValue};

use crate::convert::{core_to_lua, lua_to_core};
use crate::dispatcher::Dispatcher;
use crate::module::{
    HookFault, HookOutcome, HookResult, InitResult, JoinAttemptResult, LoopResult, MatchContext,
    MatchModule,
};

struct DispatcherHandle(Rc<RefCell<Dispatcher>>);

impl UserData for DispatcherHandle {
    fn add_methods<'lua, M: UserDataMethods<'lua, Self>>(methods: &mut M) {
        methods.add_method(
            "broadcast",
            |lua, this, (op_code, data, reliable): (u64, LuaValue, Option<bool>)| {
                let bytes = lua_value_to_bytes(lua, &data)?;
                this.0
                    .borrow_mut()
                    .broadcast(op_code, bytes, None, None, reliable.unwrap_or(true));
                Ok(())
            },
        );
        methods.add_method("kick", |_, this, user_ids: Vec<String>| {
            // Scripts kick by user id; the handler resolves presences by
            // id before the call reaches the dispatcher buffer, so we
            // stash a marker presence carrying only the id. The handler
            // is responsible for rehydrating full presences on drain.
            let placeholders = user_ids
                .into_iter()
                .map(|id| Presence {
                    user_id: match_core::UserId::new(id),
                    session_id: match_core::SessionId::new(String::new()),
                    node_id: match_core::NodeId::new(String::new()),
                    username: String::new(),
                    hidden: false,
                    persistence: false,
                    status: 0,
                })
                .collect();
            this.0.borrow_mut().kick(placeholders);
            Ok(())
        });
        methods.add_method("match_label_update", |_, this, label: String| {
            this.0
                .borrow_mut()
                .match_label_update(label)
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
        });
    }
}

fn lua_value_to_bytes(_lua: &Lua, value: &LuaValue) -> mlua::Result<Vec<u8>> {
    match value {
        LuaValue::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(mlua::Error::RuntimeError(format!(
            "broadcast data must be a string, got {}",
            other.type_name()
        ))),
    }
}

pub struct LuaMatchModule {
    lua: Lua,
}

impl LuaMatchModule {
    /// Load `source` into a fresh interpreter. Execution happens once
    /// here (to register the hook functions as globals); hooks are
    /// invoked afterwards via `call_hook`.
    pub fn load(source: &str) -> Result<Self, HookFault> {
        let lua = Lua::new();
        lua.load(source)
            .exec()
            .map_err(|e| HookFault(format!("module load failed: {e}")))?;
        Ok(Self { lua })
    }

    fn context_table(&self, ctx: &MatchContext) -> mlua::Result<mlua::Table<'_>> {
        let table = self.lua.create_table()?;
        table.set("match_id", ctx.match_id.clone())?;
        table.set("node", ctx.node.clone())?;
        table.set("tick_rate", ctx.tick_rate)?;
        table.set("label", ctx.label.clone())?;
        let env = self.lua.create_table()?;
        for (k, v) in &ctx.env {
            env.set(k.as_str(), v.as_str())?;
        }
        table.set("env", env)?;
        Ok(table)
    }

    fn presence_table(&self, presence: &Presence) -> mlua::Result<mlua::Table<'_>> {
        let table = self.lua.create_table()?;
        table.set("user_id", presence.user_id.as_str().to_string())?;
        table.set("session_id", presence.session_id.as_str().to_string())?;
        table.set("node_id", presence.node_id.as_str().to_string())?;
        table.set("username", presence.username.clone())?;
        table.set("hidden", presence.hidden)?;
        Ok(table)
    }
}

impl MatchModule for LuaMatchModule {
    fn init(&mut self, ctx: &MatchContext, params: &CoreValue) -> HookResult<InitResult> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("match_init")
            .map_err(|e| HookFault(format!("missing match_init: {e}")))?;
        let ctx_table = self
            .context_table(ctx)
            .map_err(|e| HookFault(e.to_string()))?;
        let params_lua =
            core_to_lua(&self.lua, params).map_err(|e| HookFault(e.to_string()))?;

        let result: mlua::Value = func
            .call((ctx_table, params_lua))
            .map_err(|e| HookFault(format!("match_init raised: {e}")))?;

        match result {
            LuaValue::Nil => Ok(HookOutcome::EndOfReturns),
            LuaValue::Table(t) => {
                let state_lua: LuaValue = t.get("state").map_err(|e| HookFault(e.to_string()))?;
                let tick_rate: u32 = t.get("tick_rate").map_err(|e| HookFault(e.to_string()))?;
                let label: String = t.get("label").map_err(|e| HookFault(e.to_string()))?;
                let state = lua_to_core(&state_lua).map_err(|e| HookFault(e.to_string()))?;
                Ok(HookOutcome::Continue(InitResult {
                    state,
                    tick_rate,
                    label,
                }))
            }
            other => Err(HookFault(format!(
                "match_init must return a table or nil, got {}",
                other.type_name()
            ))),
        }
    }

    fn join_attempt(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        presence: &Presence,
        metadata: &CoreValue,
    ) -> HookResult<JoinAttemptResult> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("match_join_attempt")
            .map_err(|e| HookFault(format!("missing match_join_attempt: {e}")))?;
        let ctx_table = self
            .context_table(ctx)
            .map_err(|e| HookFault(e.to_string()))?;
        let state_lua = core_to_lua(&self.lua, &state).map_err(|e| HookFault(e.to_string()))?;
        let presence_table = self
            .presence_table(presence)
            .map_err(|e| HookFault(e.to_string()))?;
        let metadata_lua =
            core_to_lua(&self.lua, metadata).map_err(|e| HookFault(e.to_string()))?;

        let dispatcher_handle = self
            .lua
            .create_userdata(DispatcherHandle(Rc::new(RefCell::new(std::mem::take(
                dispatcher,
            )))))
            .map_err(|e| HookFault(e.to_string()))?;

        let result: mlua::Value = func
            .call((
                ctx_table,
                dispatcher_handle.clone(),
                tick,
                state_lua,
                presence_table,
                metadata_lua,
            ))
            .map_err(|e| HookFault(format!("match_join_attempt raised: {e}")))?;

        *dispatcher = take_dispatcher(dispatcher_handle);

        match result {
            LuaValue::Nil => Ok(HookOutcome::EndOfReturns),
            LuaValue::Table(t) => {
                let new_state: LuaValue = t.get("state").map_err(|e| HookFault(e.to_string()))?;
                let allow: bool = t.get("allow").map_err(|e| HookFault(e.to_string()))?;
                let reject_reason: Option<String> =
                    t.get("reject_reason").map_err(|e| HookFault(e.to_string()))?;
                let state = lua_to_core(&new_state).map_err(|e| HookFault(e.to_string()))?;
                Ok(HookOutcome::Continue(JoinAttemptResult {
                    state,
                    allow,
                    reject_reason,
                }))
            }
            other => Err(HookFault(format!(
                "match_join_attempt must return a table or nil, got {}",
                other.type_name()
            ))),
        }
    }

    fn leave(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        leavers: &[Presence],
    ) -> HookResult<LoopResult> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("match_leave")
            .map_err(|e| HookFault(format!("missing match_leave: {e}")))?;
        let ctx_table = self
            .context_table(ctx)
            .map_err(|e| HookFault(e.to_string()))?;
        let state_lua = core_to_lua(&self.lua, &state).map_err(|e| HookFault(e.to_string()))?;
        let leavers_table = self.lua.create_table().map_err(|e| HookFault(e.to_string()))?;
        for (i, presence) in leavers.iter().enumerate() {
            let t = self
                .presence_table(presence)
                .map_err(|e| HookFault(e.to_string()))?;
            leavers_table
                .set(i + 1, t)
                .map_err(|e| HookFault(e.to_string()))?;
        }

        let dispatcher_handle = self
            .lua
            .create_userdata(DispatcherHandle(Rc::new(RefCell::new(std::mem::take(
                dispatcher,
            )))))
            .map_err(|e| HookFault(e.to_string()))?;

        let result: mlua::Value = func
            .call((ctx_table, dispatcher_handle.clone(), tick, state_lua, leavers_table))
            .map_err(|e| HookFault(format!("match_leave raised: {e}")))?;

        *dispatcher = take_dispatcher(dispatcher_handle);

        match result {
            LuaValue::Nil => Ok(HookOutcome::EndOfReturns),
            other => {
                let state = lua_to_core(&other).map_err(|e| HookFault(e.to_string()))?;
                Ok(HookOutcome::Continue(LoopResult { state }))
            }
        }
    }

    fn loop_tick(
        &mut self,
        ctx: &MatchContext,
        dispatcher: &mut Dispatcher,
        tick: Tick,
        state: CoreValue,
        messages: &[InboundMessage],
    ) -> HookResult<LoopResult> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get("match_loop")
            .map_err(|e| HookFault(format!("missing match_loop: {e}")))?;
        let ctx_table = self
            .context_table(ctx)
            .map_err(|e| HookFault(e.to_string()))?;
        let state_lua = core_to_lua(&self.lua, &state).map_err(|e| HookFault(e.to_string()))?;
        let messages_table = self.lua.create_table().map_err(|e| HookFault(e.to_string()))?;
        for (i, message) in messages.iter().enumerate() {
            let entry = self.lua.create_table().map_err(|e| HookFault(e.to_string()))?;
            let sender = self
                .presence_table(&message.sender)
                .map_err(|e| HookFault(e.to_string()))?;
            entry.set("sender", sender).map_err(|e| HookFault(e.to_string()))?;
            entry
                .set("op_code", message.op_code)
                .map_err(|e| HookFault(e.to_string()))?;
            entry
                .set("data", self.lua.create_string(&message.data).map_err(|e| HookFault(e.to_string()))?)
                .map_err(|e| HookFault(e.to_string()))?;
            messages_table.set(i + 1, entry).map_err(|e| HookFault(e.to_string()))?;
        }

        let dispatcher_handle = self
            .lua
            .create_userdata(DispatcherHandle(Rc::new(RefCell::new(std::mem::take(
                dispatcher,
            )))))
            .map_err(|e| HookFault(e.to_string()))?;

        let result: mlua::Value = func
            .call((ctx_table, dispatcher_handle.clone(), tick, state_lua, messages_table))
            .map_err(|e| HookFault(format!("match_loop raised: {e}")))?;

        *dispatcher = take_dispatcher(dispatcher_handle);

        match result {
            LuaValue::Nil => Ok(HookOutcome::EndOfReturns),
            other => {
                let state = lua_to_core(&other).map_err(|e| HookFault(e.to_string()))?;
                Ok(HookOutcome::Continue(LoopResult { state }))
            }
        }
    }
}

fn take_dispatcher(handle: mlua::AnyUserData) -> Dispatcher {
    let wrapper: DispatcherHandle = handle
        .take()
        .expect("dispatcher userdata is only ever borrowed within this call");
    Rc::try_unwrap(wrapper.0)
        .unwrap_or_else(|_| panic!("script retained a reference to the dispatcher"))
        .into_inner()
}
