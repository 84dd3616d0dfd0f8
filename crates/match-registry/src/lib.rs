pub mod query;
pub mod registry;

pub use query::{parse as parse_query, Query, QueryParseError};
pub use registry::{MatchListing, MatchRegistry};
