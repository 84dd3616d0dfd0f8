//! Shared boundary validation (spec §3, §7): label size and tick-rate
//! range are checked in more than one place (`init`'s returned label,
//! `match_label_update`, `CreateMatch`), so the rule lives once here.

use crate::error::MatchCoreError;

pub const MAX_LABEL_BYTES: usize = 256;
pub const MIN_TICK_RATE: u32 = 1;
pub const MAX_TICK_RATE: u32 = 60;

pub fn validate_label(label: &str) -> Result<(), MatchCoreError> {
    if label.len() > MAX_LABEL_BYTES {
        return Err(MatchCoreError::InvalidArgument(format!(
            "label is {} bytes, exceeds {MAX_LABEL_BYTES}",
            label.len()
        )));
    }
    Ok(())
}

pub fn validate_tick_rate(tick_rate: u32) -> Result<(), MatchCoreError> {
    if !(MIN_TICK_RATE..=MAX_TICK_RATE).contains(&tick_rate) {
        return Err(MatchCoreError::InvalidArgument(format!(
            "tick_rate {tick_rate} out of range [{MIN_TICK_RATE}, {MAX_TICK_RATE}]"
        )));
    }
    Ok(())
}
