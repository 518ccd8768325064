//! The interaction state machine for browser-rendered catalogs

use super::diagnostics::DiagnosticsSink;
use super::error::ProtocolError;
use super::profile::SiteProfile;
use super::wait::{is_interactable, pause, PageWaiter, ProtocolTimings};
use crate::browser::{BrowserSession, PageElement, SessionFactory, SessionSlot};
use crate::metrics::Metrics;
use crate::results::Record;
use scraper::{Html, Selector};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where a run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    SessionReady,
    PageLoaded,
    OverlayDismissed,
    ModalHandled,
    QueryEntered,
    QuerySubmitted,
    ResultsParsed,
    NextPage,
    Done,
}

/// Mutable context carried between transitions of one run
struct Run<'t> {
    term: &'t str,
    input: Option<Box<dyn PageElement>>,
    records: Vec<Record>,
    pages: usize,
    seen: HashSet<u64>,
}

impl<'t> Run<'t> {
    fn new(term: &'t str) -> Self {
        Self {
            term,
            input: None,
            records: Vec::new(),
            pages: 0,
            seen: HashSet::new(),
        }
    }
}

/// Records found on one rendered page
#[derive(Debug, Default)]
struct ParsedPage {
    strategy: Option<String>,
    containers: usize,
    records: Vec<Record>,
}

/// Drives one site through load, overlay and modal handling, query entry,
/// submission, parsing and pagination.
///
/// The browser session is created on first use and kept for later calls;
/// [`shutdown`](Self::shutdown) releases it.
pub struct InteractiveScraper<P: SiteProfile> {
    profile: P,
    slot: SessionSlot,
    waiter: PageWaiter,
    diagnostics: DiagnosticsSink,
    metrics: Option<Arc<Metrics>>,
}

impl<P: SiteProfile> InteractiveScraper<P> {
    pub fn new(profile: P, factory: Arc<dyn SessionFactory>, timings: ProtocolTimings) -> Self {
        Self {
            profile,
            slot: SessionSlot::new(factory),
            waiter: PageWaiter::new(timings),
            diagnostics: DiagnosticsSink::disabled(),
            metrics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsSink) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    /// Run one search.
    ///
    /// Only a failure to start the browser propagates. Every later failure is
    /// logged, captured to the diagnostics directory and answered with an
    /// empty result set.
    pub async fn search(&self, term: &str) -> anyhow::Result<Vec<Record>> {
        let id = self.profile.id();
        let lease = self.slot.acquire().await?;
        let session = lease.session();

        match self.drive(session, term, lease.is_fresh()).await {
            Ok(records) => {
                info!("Found {} results on '{}' for '{}'", records.len(), id, term);
                Ok(records)
            }
            Err(e) => {
                error!("Error during search for '{}' on '{}': {}", term, id, e);
                self.diagnostics.capture(session, id, "error").await;
                Ok(Vec::new())
            }
        }
    }

    /// Release the browser session
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.slot.dispose().await
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        term: &str,
        new_session: bool,
    ) -> Result<Vec<Record>, ProtocolError> {
        self.profile
            .prepare(session, &self.waiter, new_session)
            .await?;

        let mut run = Run::new(term);
        let mut state = ProtocolState::SessionReady;
        while state != ProtocolState::Done {
            let next = self.step(state, session, &mut run).await?;
            debug!("{}: {:?} -> {:?}", self.profile.id(), state, next);
            state = next;
        }
        Ok(run.records)
    }

    async fn step(
        &self,
        state: ProtocolState,
        session: &dyn BrowserSession,
        run: &mut Run<'_>,
    ) -> Result<ProtocolState, ProtocolError> {
        match state {
            ProtocolState::SessionReady => self.load_search_page(session).await,
            ProtocolState::PageLoaded => {
                self.dismiss_overlays(session).await;
                Ok(ProtocolState::OverlayDismissed)
            }
            ProtocolState::OverlayDismissed => {
                self.handle_modals(session).await;
                Ok(ProtocolState::ModalHandled)
            }
            ProtocolState::ModalHandled => self.enter_query(session, run).await,
            ProtocolState::QueryEntered => self.submit_query(session, run).await,
            ProtocolState::QuerySubmitted | ProtocolState::NextPage => {
                self.parse_page(session, run).await
            }
            ProtocolState::ResultsParsed => self.follow_next_page(session, run).await,
            ProtocolState::Done => Ok(ProtocolState::Done),
        }
    }

    async fn load_search_page(
        &self,
        session: &dyn BrowserSession,
    ) -> Result<ProtocolState, ProtocolError> {
        let url = self.profile.search_url();
        debug!("Opening {}", url);
        session.navigate(&url).await?;
        self.waiter.wait_for_page_load(session).await;
        Ok(ProtocolState::PageLoaded)
    }

    /// Click away cookie banners and popups. Best effort.
    async fn dismiss_overlays(&self, session: &dyn BrowserSession) {
        let animation = self.waiter.timings().animation_pause;

        for selector in &self.profile.selectors().overlays {
            let elements = match session.find_all(selector).await {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("Error handling overlay with selector {}: {}", selector, e);
                    continue;
                }
            };
            for element in elements {
                if !element.is_displayed().await.unwrap_or(false) {
                    continue;
                }
                match element.click().await {
                    Ok(()) => {
                        debug!("Dismissed overlay {}", selector);
                        pause(animation).await;
                    }
                    Err(e) => debug!("Overlay {} not clickable: {}", selector, e),
                }
            }
        }

        // a click on the page body closes most remaining popups
        match session.find_all("body").await {
            Ok(bodies) => {
                if let Some(body) = bodies.first() {
                    if let Err(e) = body.click().await {
                        debug!("Error clicking body element: {}", e);
                    }
                }
            }
            Err(e) => debug!("Error clicking body element: {}", e),
        }
    }

    /// Refresh and close modals until none is visible. Best effort.
    async fn handle_modals(&self, session: &dyn BrowserSession) {
        let selectors = &self.profile.selectors().modal_close;
        if selectors.is_empty() {
            return;
        }
        let timings = self.waiter.timings();

        for attempt in 1..=timings.modal_attempts {
            pause(timings.modal_retry_delay).await;

            if let Err(e) = session.refresh().await {
                debug!("Refresh before modal attempt {} failed: {}", attempt, e);
                continue;
            }
            self.waiter.wait_for_page_load(session).await;

            for selector in selectors {
                let Some(present) = self
                    .waiter
                    .wait_for_element(session, selector, timings.modal_probe_timeout)
                    .await
                else {
                    debug!("Modal selector {} not found", selector);
                    continue;
                };
                if !present.is_displayed().await.unwrap_or(false) {
                    continue;
                }
                let Some(clickable) = self
                    .waiter
                    .wait_for_clickable(session, selector, timings.modal_probe_timeout)
                    .await
                else {
                    debug!("Modal selector {} not clickable", selector);
                    continue;
                };
                match clickable.click().await {
                    Ok(()) => {
                        debug!("Closed modal via {}", selector);
                        pause(timings.animation_pause).await;
                        break;
                    }
                    Err(e) => debug!("Modal selector {} click failed: {}", selector, e),
                }
            }

            if !self.modal_visible(session).await {
                debug!("No modal visible after attempt {}", attempt);
                return;
            }
        }

        warn!(
            "Failed to handle modals after {} attempts on '{}'",
            timings.modal_attempts,
            self.profile.id()
        );
    }

    async fn modal_visible(&self, session: &dyn BrowserSession) -> bool {
        let probe = &self.profile.selectors().modal_probe;
        if probe.is_empty() {
            return false;
        }
        let Ok(modals) = session.find_all(probe).await else {
            return false;
        };
        for modal in modals {
            if modal.is_displayed().await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    async fn find_search_input(&self, session: &dyn BrowserSession) -> Option<Box<dyn PageElement>> {
        let timeout = self.waiter.timings().input_timeout;

        for selector in &self.profile.selectors().search_inputs {
            if let Some(element) = self.waiter.wait_for_element(session, selector, timeout).await {
                if is_interactable(element.as_ref()).await {
                    debug!("Found search input with selector: {}", selector);
                    return Some(element);
                }
            }
        }

        // any visible text or search field will do
        let inputs = session.find_all("input").await.ok()?;
        for input in inputs {
            let kind = input
                .attribute("type")
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| "text".to_string())
                .to_lowercase();
            if (kind == "text" || kind == "search") && input.is_displayed().await.unwrap_or(false)
            {
                debug!("Falling back to first visible {} input", kind);
                return Some(input);
            }
        }
        None
    }

    async fn enter_query(
        &self,
        session: &dyn BrowserSession,
        run: &mut Run<'_>,
    ) -> Result<ProtocolState, ProtocolError> {
        let timings = self.waiter.timings();
        let input = self
            .find_search_input(session)
            .await
            .ok_or(ProtocolError::SearchInputNotFound)?;

        if let Err(e) = input.scroll_into_view().await {
            debug!("Scrolling search input into view failed: {}", e);
        }
        pause(timings.input_settle).await;

        if let Err(e) = input.clear().await {
            debug!("Clearing search input failed: {}", e);
        }
        pause(timings.animation_pause).await;

        if let Err(e) = input.type_text(run.term).await {
            debug!("Direct input failed, trying script: {}", e);
            input
                .set_value_by_script(run.term)
                .await
                .map_err(|e| ProtocolError::InputRejected(e.to_string()))?;
        }
        pause(timings.input_settle).await;

        run.input = Some(input);
        Ok(ProtocolState::QueryEntered)
    }

    /// Enter key, then a submit button, then a scripted form submit
    async fn submit_query(
        &self,
        session: &dyn BrowserSession,
        run: &mut Run<'_>,
    ) -> Result<ProtocolState, ProtocolError> {
        let input = run.input.take().ok_or(ProtocolError::SearchInputNotFound)?;
        let timeout = self.waiter.timings().submit_timeout;

        match input.press_enter().await {
            Ok(()) => return Ok(ProtocolState::QuerySubmitted),
            Err(e) => debug!("Enter key failed: {}", e),
        }

        for selector in &self.profile.selectors().submit_buttons {
            if let Some(button) = self.waiter.wait_for_clickable(session, selector, timeout).await {
                match button.click().await {
                    Ok(()) => return Ok(ProtocolState::QuerySubmitted),
                    Err(e) => debug!("Submit button click failed: {}", e),
                }
            }
        }

        match input.submit_form().await {
            Ok(()) => Ok(ProtocolState::QuerySubmitted),
            Err(e) => {
                debug!("Scripted form submit failed: {}", e);
                Err(ProtocolError::SubmitFailed)
            }
        }
    }

    async fn parse_page(
        &self,
        session: &dyn BrowserSession,
        run: &mut Run<'_>,
    ) -> Result<ProtocolState, ProtocolError> {
        let id = self.profile.id();
        self.waiter.wait_for_page_load(session).await;
        let html = session.content().await?;

        if !run.seen.insert(fingerprint(&html)) {
            warn!("'{}' served an already parsed page, stopping pagination", id);
            return Ok(ProtocolState::Done);
        }

        let parsed = self.parse_results(&html);
        if parsed.containers == 0 {
            if run.pages == 0 {
                // valid empty result, but also what a markup change looks like
                warn!(signal = "no_result_containers", "No result containers found on '{}'", id);
                if let Some(ref metrics) = self.metrics {
                    metrics.record_empty_parse(id);
                }
                self.diagnostics.capture(session, id, "no_results").await;
            }
            return Ok(ProtocolState::Done);
        }

        debug!(
            "Page {} of '{}': {} containers via {:?}, {} records",
            run.pages + 1,
            id,
            parsed.containers,
            parsed.strategy,
            parsed.records.len()
        );
        run.pages += 1;
        run.records.extend(parsed.records);
        Ok(ProtocolState::ResultsParsed)
    }

    fn parse_results(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);

        for css in &self.profile.selectors().result_containers {
            let selector = match Selector::parse(css) {
                Ok(selector) => selector,
                Err(e) => {
                    warn!("Skipping invalid result selector {}: {:?}", css, e);
                    continue;
                }
            };
            let containers: Vec<_> = document.select(&selector).collect();
            if containers.is_empty() {
                continue;
            }

            let records = containers
                .iter()
                .filter_map(|node| self.profile.extract(*node))
                .filter_map(Record::non_empty)
                .map(|mut record| {
                    if record.source_backend_id.is_empty() {
                        record.source_backend_id = self.profile.id().to_string();
                    }
                    record
                })
                .collect();

            return ParsedPage {
                strategy: Some(css.clone()),
                containers: containers.len(),
                records,
            };
        }

        ParsedPage::default()
    }

    async fn follow_next_page(
        &self,
        session: &dyn BrowserSession,
        run: &mut Run<'_>,
    ) -> Result<ProtocolState, ProtocolError> {
        let Some(ref selector) = self.profile.selectors().next_page else {
            return Ok(ProtocolState::Done);
        };
        let max_pages = self.waiter.timings().max_pages;
        if run.pages >= max_pages {
            warn!(
                "Stopping pagination on '{}' after {} pages",
                self.profile.id(),
                max_pages
            );
            return Ok(ProtocolState::Done);
        }

        let Some(next) = self
            .waiter
            .wait_for_clickable(session, selector, Duration::ZERO)
            .await
        else {
            return Ok(ProtocolState::Done);
        };

        match next.click().await {
            Ok(()) => Ok(ProtocolState::NextPage),
            Err(e) => {
                warn!("Next page control on '{}' failed: {}", self.profile.id(), e);
                Ok(ProtocolState::Done)
            }
        }
    }
}

fn fingerprint(html: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    hasher.finish()
}
