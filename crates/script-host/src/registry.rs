//! Maps a module name (as referenced by `CreateMatch`, spec §4.E) to Lua
//! source text, and constructs a fresh `LuaMatchModule` per match
//! (SPEC_FULL §7: module registration was present in the original system
//! but dropped from the distilled spec; restored here since
//! `match-registry::CreateMatch` has nothing else to resolve a module
//! name against).

use std::collections::HashMap;
use std::sync::Arc;

use match_core::MatchCoreError;

use crate::lua::LuaMatchModule;
use crate::module::{HookFault, MatchModule};

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    sources: Arc<HashMap<String, String>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ModuleRegistryBuilder {
        ModuleRegistryBuilder {
            sources: HashMap::new(),
        }
    }

    pub fn load(&self, module_name: &str) -> Result<Box<dyn MatchModule>, MatchCoreError> {
        let source = self.sources.get(module_name).ok_or_else(|| {
            MatchCoreError::InvalidArgument(format!("unknown module {module_name:?}"))
        })?;
        let module = LuaMatchModule::load(source)
            .map_err(|HookFault(msg)| MatchCoreError::Internal(msg))?;
        Ok(Box::new(module))
    }

    pub fn contains(&self, module_name: &str) -> bool {
        self.sources.contains_key(module_name)
    }
}

pub struct ModuleRegistryBuilder {
    sources: HashMap<String, String>,
}

impl ModuleRegistryBuilder {
    pub fn register(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    pub fn build(self) -> ModuleRegistry {
        ModuleRegistry {
            sources: Arc::new(self.sources),
        }
    }
}
