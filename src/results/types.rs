//! Result type definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A single normalized search hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Publication year as printed by the source
    pub year: Option<String>,
    pub isbn: Option<String>,
    /// Loan or stock status ("verfügbar", "ausgeliehen", ...)
    pub availability: Option<String>,
    /// Shelf mark or branch
    pub location: Option<String>,
    /// Link to the detail page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Media type (paperback, eBook, audio book, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Backend that produced this record
    #[serde(rename = "library", default)]
    pub source_backend_id: String,
}

impl Record {
    /// Create an empty record attributed to a backend
    pub fn new(source_backend_id: impl Into<String>) -> Self {
        Self {
            source_backend_id: source_backend_id.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// True when none of the six catalog fields carries a value.
    ///
    /// `url` and `format` only describe a hit and do not make one on their own.
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.author,
            &self.year,
            &self.isbn,
            &self.availability,
            &self.location,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }

    /// Keep the record only if it carries at least one value
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Why a backend produced no records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend '{0}' not supported")]
    Unsupported(String),
    #[error("error in '{backend}': {message}")]
    Invocation { backend: String, message: String },
    #[error("error in '{0}': backend panicked")]
    Panicked(String),
    #[error("error in '{backend}': timed out after {} ms", .after.as_millis())]
    TimedOut { backend: String, after: Duration },
}

impl BackendError {
    pub fn invocation(backend: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Invocation {
            backend: backend.into(),
            message: format!("{:#}", error),
        }
    }
}

/// Outcome of one backend for one request
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Success {
        backend_id: String,
        records: Vec<Record>,
    },
    Failure {
        backend_id: String,
        message: String,
    },
}

impl SearchOutcome {
    pub fn success(backend_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self::Success {
            backend_id: backend_id.into(),
            records,
        }
    }

    pub fn failure(backend_id: impl Into<String>, error: BackendError) -> Self {
        Self::Failure {
            backend_id: backend_id.into(),
            message: error.to_string(),
        }
    }
}

/// Final response handed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub results: Vec<Record>,
    pub total_count: usize,
    /// `None` when every backend succeeded; never an empty list
    pub errors: Option<Vec<String>>,
}
