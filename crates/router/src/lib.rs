pub mod router;

pub use router::{MessageRouter, OutboundItem};
