//! Result container for merging per-backend outcomes

use super::types::*;

/// Collects backend outcomes in the order they are added and assembles the
/// final response. Records are never re-sorted.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    records: Vec<Record>,
    errors: Vec<String>,
    succeeded: Vec<String>,
}

impl ResultContainer {
    /// Create a new empty result container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one backend outcome
    pub fn add_outcome(&mut self, outcome: SearchOutcome) {
        match outcome {
            SearchOutcome::Success {
                backend_id,
                records,
            } => {
                self.records.extend(records.into_iter().map(|mut record| {
                    if record.source_backend_id.is_empty() {
                        record.source_backend_id = backend_id.clone();
                    }
                    record
                }));
                self.succeeded.push(backend_id);
            }
            SearchOutcome::Failure { message, .. } => self.errors.push(message),
        }
    }

    /// Add a failure that never reached dispatch
    pub fn add_error(&mut self, backend_id: &str, error: BackendError) {
        self.add_outcome(SearchOutcome::failure(backend_id, error));
    }

    /// Backends that returned successfully, in merge order
    pub fn succeeded(&self) -> &[String] {
        &self.succeeded
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Build the aggregated response
    pub fn into_response(self) -> AggregatedResponse {
        let total_count = self.records.len();
        AggregatedResponse {
            results: self.records,
            total_count,
            errors: if self.errors.is_empty() {
                None
            } else {
                Some(self.errors)
            },
        }
    }
}
