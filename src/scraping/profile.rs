//! Per-site knowledge plugged into the interaction protocol

use super::error::ProtocolError;
use super::wait::PageWaiter;
use crate::browser::BrowserSession;
use crate::results::Record;
use async_trait::async_trait;
use scraper::ElementRef;

/// Ordered selector strategies for one site. Earlier entries win.
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    /// Cookie banners and popups clicked away after the first load
    pub overlays: Vec<String>,
    /// Close buttons of modals that may reappear after a refresh; empty
    /// disables modal handling
    pub modal_close: Vec<String>,
    /// Detects a modal that is still visible
    pub modal_probe: String,
    pub search_inputs: Vec<String>,
    pub submit_buttons: Vec<String>,
    /// Result container strategies, most specific first
    pub result_containers: Vec<String>,
    /// A non-disabled "next page" control; none disables pagination
    pub next_page: Option<String>,
}

impl SelectorSet {
    pub fn new() -> Self {
        Self {
            modal_probe: "[class*='modal']:not([style*='display: none'])".to_string(),
            submit_buttons: vec!["button[type='submit']".to_string()],
            ..Default::default()
        }
    }

    pub fn overlays(mut self, selectors: &[&str]) -> Self {
        self.overlays = to_strings(selectors);
        self
    }

    pub fn modal_close(mut self, selectors: &[&str]) -> Self {
        self.modal_close = to_strings(selectors);
        self
    }

    pub fn search_inputs(mut self, selectors: &[&str]) -> Self {
        self.search_inputs = to_strings(selectors);
        self
    }

    pub fn result_containers(mut self, selectors: &[&str]) -> Self {
        self.result_containers = to_strings(selectors);
        self
    }

    pub fn next_page(mut self, selector: &str) -> Self {
        self.next_page = Some(selector.to_string());
        self
    }
}

fn to_strings(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

/// A site driven by [`InteractiveScraper`](super::InteractiveScraper)
#[async_trait]
pub trait SiteProfile: Send + Sync {
    /// Backend identifier, used for records and diagnostics
    fn id(&self) -> &str;

    /// Page that holds the search form
    fn search_url(&self) -> String;

    fn selectors(&self) -> &SelectorSet;

    /// Project one result container onto a record
    fn extract(&self, node: ElementRef<'_>) -> Option<Record>;

    /// Runs before the search page is opened, e.g. to log in.
    ///
    /// `new_session` is true when the browser session was just created, so
    /// any state tied to the previous session must be redone.
    async fn prepare(
        &self,
        _session: &dyn BrowserSession,
        _waiter: &PageWaiter,
        _new_session: bool,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }
}
