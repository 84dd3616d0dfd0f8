pub mod convert;
pub mod dispatcher;
pub mod lua;
pub mod module;
pub mod registry;

pub use dispatcher::{BufferedBroadcast, Dispatcher, DispatcherEffects};
pub use lua::LuaMatchModule;
pub use module::{
    HookFault, HookOutcome, HookResult, InitResult, JoinAttemptResult, LoopResult, MatchContext,
    MatchModule,
};
pub use registry::{ModuleRegistry, ModuleRegistryBuilder};
