//! Web server module
//!
//! Provides the JSON API of library-search.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
