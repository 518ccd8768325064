//! Result types and container for search results
//!
//! Every backend normalizes its hits into [`Record`]; the aggregator merges
//! per-backend [`SearchOutcome`]s into one [`AggregatedResponse`].

mod container;
mod types;

pub use container::ResultContainer;
pub use types::*;
