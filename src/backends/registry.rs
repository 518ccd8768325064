//! Backend registry for managing available catalog backends

use super::traits::Backend;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Builds a fresh backend instance
pub type BackendFactory = Arc<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

struct Entry {
    name: String,
    factory: BackendFactory,
    timeout: Option<Duration>,
    /// Long-lived instance handed out by `resolve`
    instance: OnceCell<Arc<dyn Backend>>,
}

/// Registry of all available backends, in registration order
#[derive(Default)]
pub struct BackendRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory under `name`.
    ///
    /// Returns false, leaving the first registration in place, when the name
    /// is already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        timeout: Option<Duration>,
        factory: BackendFactory,
    ) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            warn!("Backend {} registered twice, keeping the first", name);
            return false;
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry {
            name,
            factory,
            timeout,
            instance: OnceCell::new(),
        });
        true
    }

    /// Register an already built instance
    pub fn register_instance(&mut self, backend: Arc<dyn Backend>, timeout: Option<Duration>) -> bool {
        let name = backend.name().to_string();
        let shared = backend.clone();
        let registered = self.register(name.clone(), timeout, Arc::new(move || shared.clone()));
        if registered {
            if let Some(&i) = self.index.get(&name) {
                let _ = self.entries[i].instance.set(backend);
            }
        }
        registered
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// The shared instance for `name`, built on first use
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.entry(name).map(|entry| {
            entry
                .instance
                .get_or_init(|| {
                    debug!("Building backend {}", entry.name);
                    (entry.factory)()
                })
                .clone()
        })
    }

    /// An independent instance for `name`, not tracked by the registry
    pub fn instantiate(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.entry(name).map(|entry| (entry.factory)())
    }

    /// Per-backend timeout, if configured
    pub fn timeout(&self, name: &str) -> Option<Duration> {
        self.entry(name).and_then(|entry| entry.timeout)
    }

    /// All backend names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Get number of registered backends
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every instance built through `resolve`
    pub async fn shutdown(&self) {
        for entry in &self.entries {
            if let Some(backend) = entry.instance.get() {
                match backend.shutdown().await {
                    Ok(()) => debug!("Backend {} shut down", entry.name),
                    Err(e) => warn!("Error shutting down backend {}: {:#}", entry.name, e),
                }
            }
        }
    }
}
