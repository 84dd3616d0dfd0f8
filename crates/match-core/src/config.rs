//! Environment-driven runtime configuration (spec §6). No config-file
//! crate is pulled in here — the teacher repo has no comparable config
//! layer and nothing else in the example pack justifies one for a program
//! this size, so we stick to `std::env` with hard defaults.

use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub marker_deadline_ms: u64,
    pub match_input_queue_capacity: usize,
    pub match_call_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            marker_deadline_ms: 15_000,
            match_input_queue_capacity: 128,
            match_call_queue_capacity: 128,
        }
    }
}

impl RuntimeConfig {
    /// Parse from environment variables, falling back to defaults for
    /// anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            marker_deadline_ms: env_u64("MARKER_DEADLINE_MS", defaults.marker_deadline_ms),
            match_input_queue_capacity: env_usize(
                "MATCH_INPUT_QUEUE_CAPACITY",
                defaults.match_input_queue_capacity,
            ),
            match_call_queue_capacity: env_usize(
                "MATCH_CALL_QUEUE_CAPACITY",
                defaults.match_call_queue_capacity,
            ),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
