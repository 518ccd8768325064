use thiserror::Error;

/// A step of the interaction protocol that cannot continue.
///
/// These never leave the backend: the scraper logs them, captures
/// diagnostics and answers with an empty result set.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("could not find search input")]
    SearchInputNotFound,
    #[error("could not enter search term: {0}")]
    InputRejected(String),
    #[error("failed to submit search")]
    SubmitFailed,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}
