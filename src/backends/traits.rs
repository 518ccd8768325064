//! Backend traits and types

use crate::results::Record;
use async_trait::async_trait;
use scraper::ElementRef;

/// Backend-specific filters, passed through untouched by the aggregator
pub type SearchOptions = serde_json::Map<String, serde_json::Value>;

/// Main trait every catalog backend implements
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend identifier
    fn name(&self) -> &str;

    /// Short description of the backend
    fn about(&self) -> BackendAbout {
        BackendAbout::default()
    }

    /// Search the catalog for `term`.
    ///
    /// An `Err` is reported as a failure of this backend only.
    async fn search(&self, term: &str, options: &SearchOptions) -> anyhow::Result<Vec<Record>>;

    /// Project one result container onto a record.
    ///
    /// Returns `None` when required structure is missing; never panics on
    /// missing optional fields.
    fn extract_metadata(&self, node: ElementRef<'_>) -> Option<Record>;

    /// Release held resources such as a browser session
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Backend metadata
#[derive(Debug, Clone, Default)]
pub struct BackendAbout {
    /// Website URL
    pub website: Option<String>,
    /// Whether the catalog is driven through a browser
    pub interactive: bool,
    /// Whether the catalog supports logging in
    pub supports_auth: bool,
}

impl BackendAbout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn website(mut self, url: impl Into<String>) -> Self {
        self.website = Some(url.into());
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn supports_auth(mut self, supports: bool) -> Self {
        self.supports_auth = supports;
        self
    }
}

/// String form of an option value as sent in a query string; `None` for null
pub fn option_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
