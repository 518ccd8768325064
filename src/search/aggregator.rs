//! Search execution and orchestration

use super::models::SearchQuery;
use crate::backends::{Backend, BackendRegistry, SearchOptions};
use crate::metrics::Metrics;
use crate::results::{AggregatedResponse, BackendError, ResultContainer, SearchOutcome};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Fans one query out to every requested backend and merges the outcomes
pub struct Aggregator {
    registry: Arc<BackendRegistry>,
    /// Budget for the whole request
    deadline: Option<Duration>,
    metrics: Option<Arc<Metrics>>,
}

impl Aggregator {
    /// Create a new aggregator
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            deadline: None,
            metrics: None,
        }
    }

    /// Set the overall request deadline
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Search every backend in `query.backend_ids` concurrently.
    ///
    /// Unknown ids fail immediately and are reported first, in request
    /// order; failures of dispatched backends follow in dispatch order.
    /// Records keep dispatch order, then each backend's emission order.
    pub async fn run_search(&self, query: &SearchQuery) -> AggregatedResponse {
        let started = Instant::now();
        let mut container = ResultContainer::new();

        if let Some(ref metrics) = self.metrics {
            metrics.inc_search();
        }

        let mut tasks = Vec::new();
        for id in query.dispatch_order() {
            let Some(backend) = self.registry.resolve(id) else {
                warn!("Backend '{}' not supported", id);
                container.add_error(id, BackendError::Unsupported(id.to_string()));
                continue;
            };

            let budget = match (self.deadline, self.registry.timeout(id)) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            tasks.push(self.dispatch(
                id.to_string(),
                backend,
                query.term.clone(),
                query.options.clone(),
                budget.map(|budget| (started + budget, budget)),
            ));
        }

        info!("Executing search '{}' on {} backends", query.term, tasks.len());

        for outcome in join_all(tasks).await {
            container.add_outcome(outcome);
        }

        let response = container.into_response();
        info!(
            "Search '{}' finished in {:?}: {} results, {} errors",
            query.term,
            started.elapsed(),
            response.total_count,
            response.errors.as_ref().map_or(0, Vec::len)
        );
        response
    }

    /// Run one backend in its own task so a panic stays contained.
    ///
    /// `limit` is the absolute deadline together with the budget it was
    /// derived from, which is what a timeout reports.
    async fn dispatch(
        &self,
        id: String,
        backend: Arc<dyn Backend>,
        term: String,
        options: SearchOptions,
        limit: Option<(Instant, Duration)>,
    ) -> SearchOutcome {
        let start = Instant::now();
        if let Some(ref metrics) = self.metrics {
            metrics.record_dispatch(&id);
        }
        debug!("Searching backend {} with budget {:?}", id, limit.map(|(_, b)| b));

        let mut handle = tokio::spawn(async move { backend.search(&term, &options).await });

        let joined = match limit {
            Some((deadline, after)) => match timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!("Backend {} timed out after {:?}", id, after);
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_timeout(&id);
                    }
                    return SearchOutcome::failure(
                        id.clone(),
                        BackendError::TimedOut { backend: id, after },
                    );
                }
            },
            None => handle.await,
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_response_time(&id, start.elapsed());
        }

        let error = match joined {
            Ok(Ok(records)) => {
                debug!("Backend {} returned {} records", id, records.len());
                if let Some(ref metrics) = self.metrics {
                    metrics.record_success(&id);
                }
                return SearchOutcome::success(id, records);
            }
            Ok(Err(e)) => {
                error!("Backend {} failed: {:#}", id, e);
                BackendError::invocation(id.clone(), &e)
            }
            Err(e) if e.is_panic() => {
                error!("Backend {} panicked", id);
                BackendError::Panicked(id.clone())
            }
            Err(e) => {
                error!("Backend {} task failed: {}", id, e);
                BackendError::Invocation {
                    backend: id.clone(),
                    message: e.to_string(),
                }
            }
        };

        if let Some(ref metrics) = self.metrics {
            metrics.record_failure(&id);
        }
        SearchOutcome::failure(id, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Record;
    use anyhow::bail;
    use async_trait::async_trait;
    use scraper::ElementRef;

    enum Behavior {
        Records(Vec<&'static str>),
        Fail(&'static str),
        Panic,
        Sleep(Duration),
    }

    struct Stub {
        name: String,
        behavior: Behavior,
    }

    #[async_trait]
    impl Backend for Stub {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, term: &str, _options: &SearchOptions) -> anyhow::Result<Vec<Record>> {
            match self.behavior {
                Behavior::Records(ref titles) => Ok(titles
                    .iter()
                    .map(|t| Record::new("").with_title(*t).with_author(term))
                    .collect()),
                Behavior::Fail(message) => bail!("{}", message),
                Behavior::Panic => panic!("extractor bug"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok(vec![Record::new("").with_title("late")])
                }
            }
        }

        fn extract_metadata(&self, _node: ElementRef<'_>) -> Option<Record> {
            None
        }
    }

    fn registry(backends: Vec<(&str, Behavior, Option<Duration>)>) -> Arc<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        for (name, behavior, timeout) in backends {
            let stub = Arc::new(Stub {
                name: name.to_string(),
                behavior,
            });
            registry.register_instance(stub, timeout);
        }
        Arc::new(registry)
    }

    fn titles(response: &AggregatedResponse) -> Vec<&str> {
        response
            .results
            .iter()
            .filter_map(|r| r.title.as_deref())
            .collect()
    }

    #[tokio::test]
    async fn test_orwell_scenario() {
        let registry = registry(vec![
            ("A", Behavior::Records(vec!["1984", "Farm der Tiere"]), None),
            ("B", Behavior::Fail("connection refused"), None),
        ]);
        let metrics = Arc::new(Metrics::new());
        let aggregator = Aggregator::new(registry).with_metrics(metrics.clone());

        let response = aggregator
            .run_search(&SearchQuery::new("Orwell", ["A", "B", "ghost"]))
            .await;

        assert_eq!(response.total_count, 2);
        assert_eq!(titles(&response), ["1984", "Farm der Tiere"]);
        assert!(response.results.iter().all(|r| r.source_backend_id == "A"));
        assert_eq!(
            response.errors,
            Some(vec![
                "backend 'ghost' not supported".to_string(),
                "error in 'B': connection refused".to_string(),
            ])
        );

        let stats = metrics.snapshot();
        assert_eq!(stats.total_searches, 1);
        assert_eq!(stats.backends["A"].successes, 1);
        assert_eq!(stats.backends["B"].failures, 1);
        assert!(!stats.backends.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_empty_backend_list() {
        let aggregator = Aggregator::new(registry(vec![]));
        let response = aggregator
            .run_search(&SearchQuery::new("Orwell", Vec::<String>::new()))
            .await;

        assert!(response.results.is_empty());
        assert_eq!(response.total_count, 0);
        assert_eq!(response.errors, None);
    }

    #[tokio::test]
    async fn test_errors_absent_when_all_succeed() {
        let registry = registry(vec![
            ("A", Behavior::Records(vec!["a1"]), None),
            ("B", Behavior::Records(vec![]), None),
        ]);
        let response = Aggregator::new(registry)
            .run_search(&SearchQuery::new("Orwell", ["A", "B"]))
            .await;

        assert_eq!(response.errors, None);
        assert_eq!(response.total_count, 1);
    }

    #[tokio::test]
    async fn test_results_follow_dispatch_order() {
        let registry = registry(vec![
            ("slow", Behavior::Sleep(Duration::from_millis(50)), None),
            ("fast", Behavior::Records(vec!["f1", "f2"]), None),
        ]);
        let response = Aggregator::new(registry)
            .run_search(&SearchQuery::new("Orwell", ["slow", "fast", "slow"]))
            .await;

        assert_eq!(titles(&response), ["late", "f1", "f2"]);
        assert_eq!(response.total_count, response.results.len());
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let registry = registry(vec![
            ("broken", Behavior::Panic, None),
            ("A", Behavior::Records(vec!["a1"]), None),
        ]);
        let response = Aggregator::new(registry)
            .run_search(&SearchQuery::new("Orwell", ["broken", "A"]))
            .await;

        assert_eq!(titles(&response), ["a1"]);
        assert_eq!(
            response.errors,
            Some(vec!["error in 'broken': backend panicked".to_string()])
        );
    }

    #[tokio::test]
    async fn test_per_backend_timeout() {
        let registry = registry(vec![
            ("slow", Behavior::Sleep(Duration::from_secs(30)), Some(Duration::from_millis(20))),
            ("A", Behavior::Records(vec!["a1"]), None),
        ]);
        let response = Aggregator::new(registry)
            .run_search(&SearchQuery::new("Orwell", ["slow", "A"]))
            .await;

        assert_eq!(titles(&response), ["a1"]);
        assert_eq!(
            response.errors,
            Some(vec!["error in 'slow': timed out after 20 ms".to_string()])
        );
    }

    #[tokio::test]
    async fn test_overall_deadline_caps_backends() {
        let registry = registry(vec![
            ("slow", Behavior::Sleep(Duration::from_secs(30)), Some(Duration::from_secs(60))),
            ("A", Behavior::Records(vec!["a1"]), None),
        ]);
        let started = std::time::Instant::now();
        let response = Aggregator::new(registry)
            .with_deadline(Some(Duration::from_millis(30)))
            .run_search(&SearchQuery::new("Orwell", ["slow", "A"]))
            .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(response.total_count, 1);
        assert_eq!(response.errors.unwrap().len(), 1);
    }
}
