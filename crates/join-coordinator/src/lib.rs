pub mod coordinator;
pub mod marker;

pub use coordinator::{JoinAttemptRequest, JoinVerdict};
pub use marker::{JoinMarker, JoinMarkerTable};
