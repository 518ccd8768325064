//! Configuration module for library-search
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

/// Environment variable pointing at an explicit settings file
pub const SETTINGS_PATH_VAR: &str = "LIBSEARCH_SETTINGS_PATH";

/// Locations searched for settings.yml, in order
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        PathBuf::from("/etc/library-search/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("library-search/settings.yml"));
    }
    paths
}

/// Load settings from file or use defaults, then apply environment overrides
pub fn load() -> Result<Settings> {
    load_from(std::env::var(SETTINGS_PATH_VAR).ok().map(PathBuf::from))
}

/// Like [`load`], trying `explicit` before the default locations
pub fn load_from(explicit: Option<PathBuf>) -> Result<Settings> {
    let mut settings = match explicit
        .into_iter()
        .chain(default_paths())
        .find(|path| path.exists())
    {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)
                .with_context(|| format!("invalid settings file {}", path.display()))?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.merge_env();
    Ok(settings)
}
