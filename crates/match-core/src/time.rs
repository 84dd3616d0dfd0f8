//! Q32.32 fixed-point microsecond durations, used to turn millisecond
//! deadlines (join-marker expiry, §3/§4.F) into tick counts without
//! floating point drift.

/// Q32.32 fixed-point time duration in microseconds.
///
/// Storage: `u64` with 32 integer bits + 32 fractional bits.
/// Base unit: microseconds (1 second = 1,000,000 us).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(u64);

impl Micros {
    const FRAC_BITS: u32 = 32;
    const MICROS_PER_SEC: u64 = 1_000_000;

    pub const fn from_millis(millis: u32) -> Self {
        Self((millis as u64 * 1_000) << Self::FRAC_BITS)
    }

    /// Convert to a tick count at the given tick rate.
    ///
    /// `ticks = (micros * tick_hz) / MICROS_PER_SEC`, using a 128-bit
    /// intermediate to avoid overflow.
    pub const fn to_ticks(self, tick_hz: u32) -> u64 {
        let numer = self.0 as u128 * tick_hz as u128;
        let denom = Self::MICROS_PER_SEC << Self::FRAC_BITS;
        (numer / denom as u128) as u64
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}
