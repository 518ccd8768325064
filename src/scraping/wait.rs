//! Waiting and polling helpers for rendered pages

use crate::browser::{BrowserSession, PageElement};
use crate::config::{seconds, BrowserSettings};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Pauses and timeouts used while driving a page
#[derive(Debug, Clone)]
pub struct ProtocolTimings {
    pub page_load_timeout: Duration,
    pub load_settle: Duration,
    pub post_load_settle: Duration,
    pub animation_pause: Duration,
    pub modal_retry_delay: Duration,
    pub modal_attempts: u32,
    pub modal_probe_timeout: Duration,
    pub input_timeout: Duration,
    pub input_settle: Duration,
    pub submit_timeout: Duration,
    pub poll_interval: Duration,
    pub max_pages: usize,
}

impl ProtocolTimings {
    /// Unusable values fall back to the built-in defaults
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        let defaults = BrowserSettings::default();
        let secs = |name: &str, value: f64, fallback: f64| {
            seconds(&format!("browser.{name}"), value.max(0.0))
                .unwrap_or_else(|| Duration::from_secs_f64(fallback))
        };
        Self {
            page_load_timeout: secs(
                "page_load_timeout",
                settings.page_load_timeout,
                defaults.page_load_timeout,
            ),
            load_settle: secs("load_settle", settings.load_settle, defaults.load_settle),
            post_load_settle: secs(
                "post_load_settle",
                settings.post_load_settle,
                defaults.post_load_settle,
            ),
            animation_pause: secs(
                "animation_pause",
                settings.animation_pause,
                defaults.animation_pause,
            ),
            modal_retry_delay: secs(
                "modal_retry_delay",
                settings.modal_retry_delay,
                defaults.modal_retry_delay,
            ),
            modal_attempts: settings.modal_attempts.max(1),
            modal_probe_timeout: secs(
                "modal_probe_timeout",
                settings.modal_probe_timeout,
                defaults.modal_probe_timeout,
            ),
            input_timeout: secs("input_timeout", settings.input_timeout, defaults.input_timeout),
            input_settle: secs("input_settle", settings.input_settle, defaults.input_settle),
            submit_timeout: secs(
                "submit_timeout",
                settings.submit_timeout,
                defaults.submit_timeout,
            ),
            poll_interval: secs("poll_interval", settings.poll_interval, defaults.poll_interval)
                .max(Duration::from_millis(1)),
            max_pages: settings.max_pages.max(1),
        }
    }

    /// No pauses and single-shot waits, for driving scripted pages
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            page_load_timeout: Duration::ZERO,
            load_settle: Duration::ZERO,
            post_load_settle: Duration::ZERO,
            animation_pause: Duration::ZERO,
            modal_retry_delay: Duration::ZERO,
            modal_attempts: 3,
            modal_probe_timeout: Duration::ZERO,
            input_timeout: Duration::ZERO,
            input_settle: Duration::ZERO,
            submit_timeout: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            max_pages: 50,
        }
    }
}

impl Default for ProtocolTimings {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

/// Pause unless the duration is zero
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

/// Poll `probe` until it yields a value or `timeout` elapses.
///
/// The probe always runs at least once.
pub async fn poll_for<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(interval).await;
    }
}

/// Page readiness checks shared by every protocol step
#[derive(Debug, Clone)]
pub struct PageWaiter {
    timings: ProtocolTimings,
}

impl PageWaiter {
    pub fn new(timings: ProtocolTimings) -> Self {
        Self { timings }
    }

    pub fn timings(&self) -> &ProtocolTimings {
        &self.timings
    }

    /// Wait for body, `readyState == complete` and a finished resource load.
    ///
    /// Each condition has its own timeout. A timeout is logged and the wait
    /// moves on: many pages render usable content before every async
    /// sub-resource completes.
    pub async fn wait_for_page_load(&self, session: &dyn BrowserSession) {
        let t = &self.timings;
        pause(t.load_settle).await;

        let body = poll_for(t.page_load_timeout, t.poll_interval, || async move {
            match session.find_all("body").await {
                Ok(found) if !found.is_empty() => Some(()),
                _ => None,
            }
        })
        .await;
        if body.is_none() {
            warn!("Timeout waiting for page load: no body element");
        }

        let ready = poll_for(t.page_load_timeout, t.poll_interval, || async move {
            match session.ready_state().await {
                Ok(state) if state == "complete" => Some(()),
                _ => None,
            }
        })
        .await;
        if ready.is_none() {
            warn!("Timeout waiting for page load: document not complete");
        }

        let resources = poll_for(t.page_load_timeout, t.poll_interval, || async move {
            match session.loaded_resource_count().await {
                Ok(count) if count > 0 => Some(count),
                _ => None,
            }
        })
        .await;
        match resources {
            Some(count) => debug!("Page loaded ({} resources)", count),
            None => warn!("Timeout waiting for page load: no resource finished loading"),
        }

        pause(t.post_load_settle).await;
    }

    /// First element matching `selector` within `timeout`
    pub async fn wait_for_element(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        timeout: Duration,
    ) -> Option<Box<dyn PageElement>> {
        poll_for(timeout, self.timings.poll_interval, || async move {
            match session.find_all(selector).await {
                Ok(found) => found.into_iter().next(),
                Err(e) => {
                    debug!("Lookup of {} failed: {}", selector, e);
                    None
                }
            }
        })
        .await
    }

    /// First displayed and enabled element matching `selector` within `timeout`
    pub async fn wait_for_clickable(
        &self,
        session: &dyn BrowserSession,
        selector: &str,
        timeout: Duration,
    ) -> Option<Box<dyn PageElement>> {
        poll_for(timeout, self.timings.poll_interval, || async move {
            let found = match session.find_all(selector).await {
                Ok(found) => found,
                Err(_) => return None,
            };
            for element in found {
                if is_interactable(element.as_ref()).await {
                    return Some(element);
                }
            }
            None
        })
        .await
    }
}

/// Displayed and enabled; lookup errors count as "no"
pub async fn is_interactable(element: &dyn PageElement) -> bool {
    element.is_displayed().await.unwrap_or(false) && element.is_enabled().await.unwrap_or(false)
}
