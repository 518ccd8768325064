//! Search orchestration module
//!
//! Fans a query out to the requested backends, isolates their failures and
//! merges the outcomes into one response.

mod aggregator;
mod models;

pub use aggregator::Aggregator;
pub use models::*;
