pub mod tracker;

pub use tracker::{NullEventSink, PresenceEventSink, PresenceTracker, TrackOutcome};
