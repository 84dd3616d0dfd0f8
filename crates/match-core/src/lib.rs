pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod presence;
pub mod stream;
pub mod time;
pub mod validate;
pub mod value;

pub use config::RuntimeConfig;
pub use envelope::{Envelope, InboundMessage, MatchDataEnvelope, PresenceEventEnvelope, PresenceEventKind};
pub use error::MatchCoreError;
pub use ids::{MatchAddress, MatchId, NodeId, SessionId, Tick, UserId};
pub use presence::{Presence, PresenceKey};
pub use stream::{Stream, StreamMode};
pub use time::Micros;
pub use value::CoreValue;
