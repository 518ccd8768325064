//! Metrics collection module
//!
//! Tracks backend dispatches, outcomes, response times and empty parses.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Response times kept per backend for the rolling average
const RESPONSE_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct BackendCounters {
    dispatched: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    empty_parses: u64,
    response_times: VecDeque<u64>,
}

/// Global metrics collector
pub struct Metrics {
    /// Total search count
    total_searches: AtomicU64,
    backends: RwLock<HashMap<String, BackendCounters>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            backends: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BackendCounters>> {
        self.backends.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, backend: &str, f: impl FnOnce(&mut BackendCounters)) {
        let mut backends: RwLockWriteGuard<'_, _> = self
            .backends
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(backends.entry(backend.to_string()).or_default());
    }

    /// Increment total search count
    pub fn inc_search(&self) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a backend was invoked
    pub fn record_dispatch(&self, backend: &str) {
        self.update(backend, |c| c.dispatched += 1);
    }

    /// Record backend response time
    pub fn record_response_time(&self, backend: &str, elapsed: Duration) {
        let ms = elapsed.as_millis().min(u64::MAX as u128) as u64;
        self.update(backend, |c| {
            if c.response_times.len() >= RESPONSE_WINDOW {
                c.response_times.pop_front();
            }
            c.response_times.push_back(ms);
        });
    }

    pub fn record_success(&self, backend: &str) {
        self.update(backend, |c| c.successes += 1);
    }

    pub fn record_failure(&self, backend: &str) {
        self.update(backend, |c| c.failures += 1);
    }

    /// A timeout also counts as a failure
    pub fn record_timeout(&self, backend: &str) {
        self.update(backend, |c| {
            c.timeouts += 1;
            c.failures += 1;
        });
    }

    /// A rendered result page had no recognizable result containers
    pub fn record_empty_parse(&self, backend: &str) {
        self.update(backend, |c| c.empty_parses += 1);
    }

    /// Get total searches
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    pub fn empty_parses(&self, backend: &str) -> u64 {
        self.read().get(backend).map_or(0, |c| c.empty_parses)
    }

    /// Get average response time for a backend
    pub fn avg_response_time(&self, backend: &str) -> Option<u64> {
        self.read().get(backend).and_then(average)
    }

    /// Share of successful calls in percent; 100 when nothing finished yet
    pub fn reliability(&self, backend: &str) -> f64 {
        self.read().get(backend).map_or(100.0, reliability)
    }

    /// Serializable view of every backend seen so far
    pub fn snapshot(&self) -> MetricsSnapshot {
        let backends = self
            .read()
            .iter()
            .map(|(name, c)| {
                (
                    name.clone(),
                    BackendStats {
                        dispatched: c.dispatched,
                        successes: c.successes,
                        failures: c.failures,
                        timeouts: c.timeouts,
                        empty_parses: c.empty_parses,
                        avg_response_time: average(c),
                        reliability: reliability(c),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            total_searches: self.total_searches(),
            backends,
        }
    }
}

fn average(c: &BackendCounters) -> Option<u64> {
    if c.response_times.is_empty() {
        None
    } else {
        Some(c.response_times.iter().sum::<u64>() / c.response_times.len() as u64)
    }
}

fn reliability(c: &BackendCounters) -> f64 {
    let total = c.successes + c.failures;
    if total == 0 {
        100.0
    } else {
        (c.successes as f64 / total as f64) * 100.0
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStats {
    pub dispatched: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub empty_parses: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub backends: BTreeMap<String, BackendStats>,
}
