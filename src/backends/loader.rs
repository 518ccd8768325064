//! Backend loader for building the registry from configuration

use super::catalog::HtmlCatalog;
use super::noworzyn::{Noworzyn, NoworzynSite};
use super::onleihe::{Onleihe, OnleiheSite};
use super::registry::{BackendFactory, BackendRegistry};
use super::traits::Backend;
use crate::browser::{BrowserOptions, ChromiumFactory, SessionFactory};
use crate::config::{BackendConfig, Settings};
use crate::metrics::Metrics;
use crate::network::HttpClient;
use crate::scraping::{DiagnosticsSink, InteractiveScraper, ProtocolTimings, SiteProfile};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared resources handed to every backend the loader builds
#[derive(Clone)]
pub struct BackendLoader {
    client: HttpClient,
    sessions: Arc<dyn SessionFactory>,
    timings: ProtocolTimings,
    diagnostics: DiagnosticsSink,
    metrics: Option<Arc<Metrics>>,
}

impl BackendLoader {
    /// Loader launching Chromium for interactive backends
    pub fn new(settings: &Settings, client: HttpClient) -> Self {
        let options = BrowserOptions::from_settings(&settings.browser);
        Self {
            client,
            sessions: Arc::new(ChromiumFactory::new(options)),
            timings: ProtocolTimings::from_settings(&settings.browser),
            diagnostics: DiagnosticsSink::new(settings.browser.diagnostics_dir.clone()),
            metrics: None,
        }
    }

    pub fn with_session_factory(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_timings(mut self, timings: ProtocolTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register every enabled backend from settings
    pub fn load(&self, settings: &Settings) -> BackendRegistry {
        let mut registry = BackendRegistry::new();

        for config in &settings.backends {
            if config.disabled {
                info!("Skipping disabled backend: {}", config.name);
                continue;
            }

            match self.factory(config) {
                Ok(factory) => {
                    if registry.register(config.name.clone(), config.timeout(), factory) {
                        info!("Loaded backend: {} ({})", config.name, config.backend);
                    }
                }
                Err(e) => warn!("Failed to load backend {}: {}", config.name, e),
            }
        }

        info!("Loaded {} backends", registry.len());
        registry
    }

    fn scraper<P: SiteProfile>(&self, site: P) -> InteractiveScraper<P> {
        let scraper = InteractiveScraper::new(site, self.sessions.clone(), self.timings.clone())
            .with_diagnostics(self.diagnostics.clone());
        match self.metrics {
            Some(ref metrics) => scraper.with_metrics(metrics.clone()),
            None => scraper,
        }
    }

    /// Factory for one configured backend
    fn factory(&self, config: &BackendConfig) -> Result<BackendFactory> {
        if config.name.is_empty() {
            return Err(anyhow!("backend without a name"));
        }
        let loader = self.clone();
        let config = config.clone();

        let factory: BackendFactory = match config.backend.as_str() {
            "example_library" => Arc::new(move || {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| HtmlCatalog::DEFAULT_BASE_URL.to_string());
                Arc::new(HtmlCatalog::new(config.name.clone(), base_url, loader.client.clone()))
                    as Arc<dyn Backend>
            }),
            "noworzyn" => Arc::new(move || {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| NoworzynSite::DEFAULT_BASE_URL.to_string());
                let site = NoworzynSite::new(config.name.clone(), base_url);
                Arc::new(Noworzyn::new(loader.scraper(site))) as Arc<dyn Backend>
            }),
            "onleihe_koeln" => Arc::new(move || {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OnleiheSite::DEFAULT_BASE_URL.to_string());
                let site = OnleiheSite::new(config.name.clone(), base_url)
                    .with_credentials(config.credentials());
                Arc::new(Onleihe::new(loader.scraper(site))) as Arc<dyn Backend>
            }),
            other => {
                return Err(anyhow!(
                    "Unknown backend type: {} (available: {})",
                    other,
                    Self::available_backends().join(", ")
                ))
            }
        };
        Ok(factory)
    }

    /// Get list of available backend types
    pub fn available_backends() -> Vec<&'static str> {
        vec!["example_library", "noworzyn", "onleihe_koeln"]
    }
}
