//! Lazily created, reusable browser session owned by one backend instance

use super::{BrowserSession, SessionFactory};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Holds at most one session. Callers get exclusive access through a
/// [`SessionLease`], so a backend instance never drives its tab from two
/// tasks at once.
pub struct SessionSlot {
    factory: Arc<dyn SessionFactory>,
    session: Mutex<Option<Box<dyn BrowserSession>>>,
    created: AtomicU64,
}

/// Exclusive access to the session for the duration of one search
pub struct SessionLease<'a> {
    guard: MappedMutexGuard<'a, Box<dyn BrowserSession>>,
    fresh: bool,
}

impl SessionLease<'_> {
    /// The session was created for this lease
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn session(&self) -> &dyn BrowserSession {
        &**self.guard
    }
}

impl SessionSlot {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            session: Mutex::new(None),
            created: AtomicU64::new(0),
        }
    }

    /// Get the session, creating it first if it is missing or dead.
    ///
    /// Creation failures propagate; the slot stays empty so the next call
    /// tries again from scratch.
    pub async fn acquire(&self) -> Result<SessionLease<'_>> {
        let mut guard = self.session.lock().await;

        let alive = match guard.as_ref() {
            Some(session) => Some(session.is_alive().await),
            None => None,
        };
        if alive == Some(false) {
            warn!("Browser session is no longer responding, re-creating it");
            if let Some(dead) = guard.take() {
                if let Err(e) = dead.close().await {
                    debug!("Closing dead session failed: {}", e);
                }
            }
        }

        let fresh = guard.is_none();
        if fresh {
            let session = self
                .factory
                .create()
                .await
                .context("failed to start browser session")?;
            self.created.fetch_add(1, Ordering::Relaxed);
            info!("Browser session started");
            *guard = Some(session);
        }

        let guard = MutexGuard::try_map(guard, |slot| slot.as_mut())
            .map_err(|_| anyhow::anyhow!("browser session unavailable"))?;

        Ok(SessionLease { guard, fresh })
    }

    /// Close the session if one is open
    pub async fn dispose(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await?;
            info!("Browser session closed");
        }
        Ok(())
    }

    /// Whether a session is currently held
    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Number of sessions created over the slot's lifetime
    pub fn sessions_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeFactory, FakeSite};

    #[tokio::test]
    async fn test_session_is_created_lazily_and_reused() {
        let factory = FakeFactory::new(FakeSite::single("<html><body></body></html>"));
        let slot = SessionSlot::new(factory.clone());
        assert!(!slot.is_open().await);

        {
            let lease = slot.acquire().await.unwrap();
            assert!(lease.is_fresh());
        }
        {
            let lease = slot.acquire().await.unwrap();
            assert!(!lease.is_fresh());
        }

        assert_eq!(slot.sessions_created(), 1);
        assert_eq!(factory.created(), 1);
    }

    #[tokio::test]
    async fn test_dead_session_is_recreated() {
        let factory = FakeFactory::new(FakeSite::single("<html><body></body></html>"));
        let slot = SessionSlot::new(factory.clone());

        drop(slot.acquire().await.unwrap());
        factory.kill_sessions();

        let lease = slot.acquire().await.unwrap();
        assert!(lease.is_fresh());
        assert!(lease.session().is_alive().await);
        assert_eq!(factory.created(), 2);
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_dispose_closes_session() {
        let factory = FakeFactory::new(FakeSite::single("<html><body></body></html>"));
        let slot = SessionSlot::new(factory.clone());

        drop(slot.acquire().await.unwrap());
        slot.dispose().await.unwrap();

        assert!(!slot.is_open().await);
        assert_eq!(factory.closed(), 1);

        // disposing twice is harmless
        slot.dispose().await.unwrap();
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn test_creation_failure_propagates() {
        let factory = FakeFactory::failing("chrome not installed");
        let slot = SessionSlot::new(factory);

        let err = slot.acquire().await.err().unwrap();
        assert!(format!("{:#}", err).contains("chrome not installed"));
        assert!(!slot.is_open().await);
    }
}
