//! Handler status (spec §4.D state machine) and the idempotent stop
//! signal (spec §5 "`Stop()` is idempotent and race-safe").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerStatus {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

pub struct StatusCell(Mutex<HandlerStatus>);

impl StatusCell {
    pub fn new() -> Self {
        Self(Mutex::new(HandlerStatus::Initializing))
    }

    pub fn get(&self) -> HandlerStatus {
        *self.0.lock().expect("status cell poisoned")
    }

    pub fn set(&self, status: HandlerStatus) {
        *self.0.lock().expect("status cell poisoned") = status;
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Idempotent shutdown request. Repeat `request()` calls after the first
/// are no-ops (spec §5): the flag only ever goes false → true, and
/// `notify_waiters` on an already-stopped signal simply wakes nobody.
#[derive(Default)]
pub struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Returns `true` the first time it is called; subsequent calls
    /// return `false` and do nothing further.
    pub fn request(&self) -> bool {
        let first = self
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_idempotent() {
        let s = StopSignal::new();
        assert!(s.request());
        assert!(!s.request());
        assert!(s.is_set());
    }
}
