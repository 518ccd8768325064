//! Onleihe e-lending portal (Köln)
//!
//! Searching works anonymously. With credentials configured the backend logs
//! in first, and again whenever the browser session had to be re-created.

use super::traits::{Backend, BackendAbout, SearchOptions};
use crate::browser::BrowserSession;
use crate::results::Record;
use crate::scraping::{
    absolute_url, attr_of, text_of, InteractiveScraper, PageWaiter, ProtocolError, SelectorSet,
    SiteProfile,
};
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const LOGIN_PATH: &str = "/frontend/myBib,0-0-0-100-0-0-0-0-0-0-0.html";
const SEARCH_PATH: &str = "/frontend/search,0-0-0-100-0-0-0-0-0-0-0.html";

/// Selectors, extraction and login for one Onleihe instance
pub struct OnleiheSite {
    name: String,
    base_url: String,
    credentials: Option<(String, String)>,
    authenticated: AtomicBool,
    selectors: SelectorSet,
}

impl OnleiheSite {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.onleihe.de/koeln";

    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            authenticated: AtomicBool::new(false),
            selectors: SelectorSet::new()
                .search_inputs(&["input#searchTerm"])
                .result_containers(&[".result-item, .media-item"])
                .next_page(".pagination .next:not(.disabled)"),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<(String, String)>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn authenticate(
        &self,
        session: &dyn BrowserSession,
        waiter: &PageWaiter,
        username: &str,
        password: &str,
    ) -> Result<(), ProtocolError> {
        let timeout = waiter.timings().input_timeout;
        session.navigate(&format!("{}{}", self.base_url, LOGIN_PATH)).await?;
        waiter.wait_for_page_load(session).await;

        let username_field = waiter
            .wait_for_element(session, "input[name='username']", timeout)
            .await
            .ok_or_else(|| ProtocolError::AuthenticationFailed("username field not found".into()))?;
        username_field.type_text(username).await?;

        let password_field = waiter
            .wait_for_element(session, "input[name='password']", timeout)
            .await
            .ok_or_else(|| ProtocolError::AuthenticationFailed("password field not found".into()))?;
        password_field.type_text(password).await?;
        password_field.press_enter().await?;
        waiter.wait_for_page_load(session).await;

        let html = session.content().await?;
        if !looks_logged_in(&html) {
            return Err(ProtocolError::AuthenticationFailed(format!(
                "no account menu after login as {}",
                username
            )));
        }
        info!("Logged in to '{}' as {}", self.name, username);
        Ok(())
    }
}

/// A logout link or the account menu is only rendered for a signed-in user
fn looks_logged_in(html: &str) -> bool {
    let document = Html::parse_document(html);
    let (Ok(links), Ok(menu)) = (Selector::parse("a"), Selector::parse(".user-menu")) else {
        return false;
    };
    document.select(&menu).next().is_some()
        || document
            .select(&links)
            .any(|a| a.text().collect::<String>().trim() == "Abmelden")
}

#[async_trait]
impl SiteProfile for OnleiheSite {
    fn id(&self) -> &str {
        &self.name
    }

    fn search_url(&self) -> String {
        format!("{}{}", self.base_url, SEARCH_PATH)
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    /// Items without a title are dropped
    fn extract(&self, node: ElementRef<'_>) -> Option<Record> {
        let title = text_of(node, ".title, .media-title")?;
        Some(Record {
            title: Some(title),
            author: text_of(node, ".author, .creator"),
            format: text_of(node, ".format, .media-type"),
            availability: text_of(node, ".availability, .status"),
            url: attr_of(node, "a.details-link, a.media-link", "href")
                .map(|href| absolute_url(&self.base_url, &href)),
            year: text_of(node, ".metadata .year, .media-metadata .year"),
            isbn: text_of(node, ".metadata .isbn, .media-metadata .isbn"),
            ..Record::new(self.name.clone())
        })
    }

    async fn prepare(
        &self,
        session: &dyn BrowserSession,
        waiter: &PageWaiter,
        new_session: bool,
    ) -> Result<(), ProtocolError> {
        let Some((ref username, ref password)) = self.credentials else {
            debug!("No credentials for '{}', searching anonymously", self.name);
            return Ok(());
        };
        if new_session {
            self.authenticated.store(false, Ordering::SeqCst);
        }
        if self.is_authenticated() {
            return Ok(());
        }

        self.authenticate(session, waiter, username, password).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// E-lending backend driven through a browser
pub struct Onleihe {
    scraper: InteractiveScraper<OnleiheSite>,
}

impl Onleihe {
    pub fn new(scraper: InteractiveScraper<OnleiheSite>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl Backend for Onleihe {
    fn name(&self) -> &str {
        self.scraper.profile().id()
    }

    fn about(&self) -> BackendAbout {
        let site = self.scraper.profile();
        BackendAbout::new()
            .website(site.base_url.clone())
            .interactive(true)
            .supports_auth(true)
    }

    /// Options are ignored
    async fn search(&self, term: &str, _options: &SearchOptions) -> Result<Vec<Record>> {
        self.scraper.search(term).await
    }

    fn extract_metadata(&self, node: ElementRef<'_>) -> Option<Record> {
        self.scraper.profile().extract(node)
    }

    async fn shutdown(&self) -> Result<()> {
        self.scraper.shutdown().await
    }
}
