//! library-search: federated search across library catalogs
//!
//! Queries library catalogs, book shops and e-lending portals concurrently,
//! normalizes their hits into one record schema and reports failing sources
//! without failing the whole request. Sources that only render in a real
//! browser are driven through the interactive scraping protocol in
//! [`scraping`].

pub mod backends;
pub mod browser;
pub mod config;
pub mod metrics;
pub mod network;
pub mod results;
pub mod scraping;
pub mod search;
pub mod web;

pub use backends::{Backend, BackendRegistry};
pub use config::Settings;
pub use results::{AggregatedResponse, Record, ResultContainer};
pub use search::{Aggregator, SearchQuery};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
