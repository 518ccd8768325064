//! Application state shared across handlers

use crate::backends::BackendRegistry;
use crate::config::Settings;
use crate::metrics::Metrics;
use crate::search::Aggregator;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Backend registry
    pub registry: Arc<BackendRegistry>,
    /// Search aggregator
    pub aggregator: Arc<Aggregator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, registry: Arc<BackendRegistry>, metrics: Arc<Metrics>) -> Self {
        let aggregator = Aggregator::new(registry.clone())
            .with_deadline(settings.search.deadline())
            .with_metrics(metrics.clone());

        Self {
            settings: Arc::new(settings),
            registry,
            aggregator: Arc::new(aggregator),
            metrics,
        }
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}
