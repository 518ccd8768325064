//! Catalog backend module
//!
//! Defines the Backend trait and provides a registry for all catalog backends.

mod loader;
mod registry;
mod traits;

// Backend implementations
pub mod catalog;
pub mod noworzyn;
pub mod onleihe;

pub use loader::BackendLoader;
pub use registry::{BackendFactory, BackendRegistry};
pub use traits::*;
