//! Search query and related data models

use crate::backends::SearchOptions;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One federated search request.
///
/// Deserializes from the field names of the HTTP API as well as their
/// camel-case and legacy spellings (`query`, `libraries`, `filters`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Search term
    #[serde(alias = "query")]
    pub term: String,
    /// Backends to search, in precedence order
    #[serde(default, alias = "backendIds", alias = "libraries")]
    pub backend_ids: Vec<String>,
    /// Backend-specific filters
    #[serde(default, alias = "filters", deserialize_with = "null_as_empty")]
    pub options: SearchOptions,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<SearchOptions, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SearchOptions>::deserialize(deserializer)?.unwrap_or_default())
}

/// Malformed search request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("search term must not be empty")]
    EmptyTerm,
}

impl SearchQuery {
    pub fn new<I, S>(term: impl Into<String>, backend_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            term: term.into(),
            backend_ids: backend_ids.into_iter().map(Into::into).collect(),
            options: SearchOptions::new(),
        }
    }

    /// Check the term is non-empty after trimming
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.term.trim().is_empty() {
            Err(QueryError::EmptyTerm)
        } else {
            Ok(())
        }
    }

    /// Backend ids without duplicates, first occurrence wins
    pub fn dispatch_order(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.backend_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}
