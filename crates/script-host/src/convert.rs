//! The host/script conversion layer (spec §4.C): "only strings, numbers,
//! booleans, byte buffers, maps with string keys, and ordered sequences
//! are permitted — deeper nesting is allowed, cycles are forbidden, and
//! unknown types are rejected at the boundary."
//!
//! Lua has no structural distinction between "map" and "sequence" — both
//! are tables. We disambiguate on conversion *out* of Lua by checking
//! whether the table's keys are a dense `1..=n` integer run (a sequence)
//! or anything else (a map); converting *into* Lua just builds the
//! matching table shape.
//!
//! Cycles are rejected by capping recursion depth rather than chasing
//! table identity: a genuine cycle has unbounded depth, so any finite
//! cap rejects it, and it doubles as the stack-safety bound for
//! legitimately deep (but finite) nesting.

use std::collections::BTreeMap;

use match_core::CoreValue;
use mlua::{Lua, Value as LuaValue};

const MAX_DEPTH: usize = 64;

#[derive(Debug)]
pub struct ConversionError(pub String);

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value conversion error: {}", self.0)
    }
}

impl std::error::Error for ConversionError {}

pub fn lua_to_core(value: &LuaValue) -> Result<CoreValue, ConversionError> {
    lua_to_core_depth(value, 0)
}

fn lua_to_core_depth(value: &LuaValue, depth: usize) -> Result<CoreValue, ConversionError> {
    if depth > MAX_DEPTH {
        return Err(ConversionError(format!(
            "nesting exceeds {MAX_DEPTH} levels (cyclic or pathologically deep table?)"
        )));
    }

    match value {
        LuaValue::Nil => Ok(CoreValue::Nil),
        LuaValue::Boolean(b) => Ok(CoreValue::Bool(*b)),
        LuaValue::Integer(i) => Ok(CoreValue::Int(*i)),
        LuaValue::Number(n) => Ok(CoreValue::Float(*n)),
        LuaValue::String(s) => {
            let bytes = s.as_bytes();
            match std::str::from_utf8(&bytes) {
                Ok(utf8) => Ok(CoreValue::Str(utf8.to_string())),
                Err(_) => Ok(CoreValue::Bytes(bytes.to_vec())),
            }
        }
        LuaValue::Table(table) => {
            if is_sequence(table) {
                let mut items = Vec::new();
                for pair in table.clone().sequence_values::<LuaValue>() {
                    let item = pair.map_err(|e| ConversionError(e.to_string()))?;
                    items.push(lua_to_core_depth(&item, depth + 1)?);
                }
                Ok(CoreValue::List(items))
            } else {
                let mut map = BTreeMap::new();
                for pair in table.clone().pairs::<LuaValue, LuaValue>() {
                    let (k, v) = pair.map_err(|e| ConversionError(e.to_string()))?;
                    let key = match k {
                        LuaValue::String(s) => s
                            .to_str()
                            .map_err(|e| ConversionError(e.to_string()))?
                            .to_string(),
                        other => {
                            return Err(ConversionError(format!(
                                "map keys must be strings, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    map.insert(key, lua_to_core_depth(&v, depth + 1)?);
                }
                Ok(CoreValue::Map(map))
            }
        }
        other => Err(ConversionError(format!(
            "unsupported script type at host boundary: {}",
            other.type_name()
        ))),
    }
}

fn is_sequence(table: &mlua::Table) -> bool {
    let len = table.raw_len();
    if len == 0 {
        // Ambiguous; treat an empty table as a map (matches an empty
        // params/state object being the common case at the boundary).
        return table.pairs::<LuaValue, LuaValue>().next().is_none();
    }
    table.clone().pairs::<LuaValue, LuaValue>().count() as i64 == len as i64
}

pub fn core_to_lua(lua: &Lua, value: &CoreValue) -> mlua::Result<LuaValue> {
    Ok(match value {
        CoreValue::Nil => LuaValue::Nil,
        CoreValue::Bool(b) => LuaValue::Boolean(*b),
        CoreValue::Int(i) => LuaValue::Integer(*i),
        CoreValue::Float(f) => LuaValue::Number(*f),
        CoreValue::Str(s) => LuaValue::String(lua.create_string(s)?),
        CoreValue::Bytes(b) => LuaValue::String(lua.create_string(b)?),
        CoreValue::Map(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), core_to_lua(lua, v)?)?;
            }
            LuaValue::Table(table)
        }
        CoreValue::List(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, core_to_lua(lua, item)?)?;
            }
            LuaValue::Table(table)
        }
    })
}
