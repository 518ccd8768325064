//! HTTP networking module
//!
//! Provides the HTTP client used by static-page backends and the client
//! identifiers shared with the headless browser.

mod client;
mod user_agent;

pub use client::{FetchedPage, HttpClient};
pub use user_agent::{generate_user_agent, DESKTOP_CHROME};
