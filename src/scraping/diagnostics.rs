//! Screenshot and markup capture for failed or empty scrapes

use crate::browser::BrowserSession;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Files written by one capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticArtifacts {
    pub screenshot: Option<PathBuf>,
    pub markup: Option<PathBuf>,
}

/// Writes `<backend>_<label>_<timestamp>_<nonce>.{png,html}` pairs
#[derive(Debug, Clone)]
pub struct DiagnosticsSink {
    dir: Option<PathBuf>,
}

impl DiagnosticsSink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Base path for one capture; the nonce keeps names unique within a second
    fn stem(dir: &Path, backend: &str, label: &str) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        dir.join(format!("{}_{}_{}_{}", backend, label, timestamp, &nonce[..8]))
    }

    /// Best-effort capture of the current page. Never fails.
    pub async fn capture(
        &self,
        session: &dyn BrowserSession,
        backend: &str,
        label: &str,
    ) -> DiagnosticArtifacts {
        let mut artifacts = DiagnosticArtifacts::default();
        let Some(dir) = self.dir.as_deref() else {
            return artifacts;
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!("Cannot create diagnostics directory {}: {}", dir.display(), e);
            return artifacts;
        }

        let stem = Self::stem(dir, backend, label);
        let screenshot = stem.with_extension("png");
        let markup = stem.with_extension("html");

        match session.screenshot(&screenshot).await {
            Ok(()) => {
                debug!("Screenshot saved to {}", screenshot.display());
                artifacts.screenshot = Some(screenshot);
            }
            Err(e) => error!("Failed to save screenshot: {}", e),
        }

        match session.content().await {
            Ok(html) => match tokio::fs::write(&markup, html).await {
                Ok(()) => {
                    debug!("Page source saved to {}", markup.display());
                    artifacts.markup = Some(markup);
                }
                Err(e) => error!("Failed to write page source: {}", e),
            },
            Err(e) => error!("Failed to read page source: {}", e),
        }

        if artifacts.screenshot.is_some() || artifacts.markup.is_some() {
            info!("Diagnostics for '{}' ({}) written to {}", backend, label, dir.display());
        }
        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeFactory, FakeSite};
    use crate::browser::SessionFactory;

    #[tokio::test]
    async fn test_capture_writes_pair() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::new(FakeSite::single("<html><body>oops</body></html>"));
        let session = factory.create().await.unwrap();

        let sink = DiagnosticsSink::new(Some(dir.path().join("nested")));
        let first = sink.capture(session.as_ref(), "noworzyn", "error").await;
        let second = sink.capture(session.as_ref(), "noworzyn", "error").await;

        let markup = first.markup.clone().unwrap();
        assert!(first.screenshot.unwrap().exists());
        assert_eq!(std::fs::read_to_string(&markup).unwrap(), "<html><body>oops</body></html>");
        assert!(markup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("noworzyn_error_"));
        assert_ne!(first.markup, second.markup);
    }

    #[tokio::test]
    async fn test_disabled_sink_writes_nothing() {
        let factory = FakeFactory::new(FakeSite::single("<html></html>"));
        let session = factory.create().await.unwrap();

        let artifacts = DiagnosticsSink::disabled()
            .capture(session.as_ref(), "noworzyn", "error")
            .await;
        assert_eq!(artifacts, DiagnosticArtifacts::default());
        assert!(factory.snapshot().screenshots.is_empty());
    }
}
