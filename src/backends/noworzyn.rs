//! Buchhandlung Noworzyn storefront
//!
//! The shop renders its search client-side and greets new visitors with a
//! cookie banner and a newsletter modal that reappears after reloads.

use super::traits::{Backend, BackendAbout, SearchOptions};
use crate::results::Record;
use crate::scraping::{
    absolute_url, attr_of, first_text_of, text_of, InteractiveScraper, SelectorSet, SiteProfile,
};
use anyhow::Result;
use async_trait::async_trait;
use scraper::ElementRef;

const OVERLAYS: &[&str] = &[
    "button.close",
    "button.modal-close",
    ".modal-close",
    ".close-button",
    "[aria-label='Close']",
    ".cookie-consent button",
    "#cookie-notice .accept",
    ".modal .close",
];

const MODAL_CLOSE: &[&str] = &[
    "[class*='modal'] button",
    "[class*='modal'] .close",
    ".modal-close",
    ".cookie-banner button",
    "#cookiebanner button",
    ".consent-banner button",
    "[aria-label='Close']",
    ".popup-close",
];

const SEARCH_INPUTS: &[&str] = &[
    "input[type='search']",
    "#search",
    "#searchbox",
    "input[name='search']",
    "input[placeholder*='such']",
    "input[placeholder*='Search']",
];

const RESULT_CONTAINERS: &[&str] = &[
    "table.article-table tr.article",
    ".article",
    ".product-container",
    ".article-container",
    ".book-container",
    ".product-list-item",
    ".search-result-item",
];

/// Selectors and extraction for the storefront
pub struct NoworzynSite {
    name: String,
    base_url: String,
    selectors: SelectorSet,
}

impl NoworzynSite {
    pub const DEFAULT_BASE_URL: &'static str = "https://buchhandlung-noworzyn.buchhandlung.de/shop/";

    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            selectors: SelectorSet::new()
                .overlays(OVERLAYS)
                .modal_close(MODAL_CLOSE)
                .search_inputs(SEARCH_INPUTS)
                .result_containers(RESULT_CONTAINERS),
        }
    }
}

impl SiteProfile for NoworzynSite {
    fn id(&self) -> &str {
        &self.name
    }

    fn search_url(&self) -> String {
        self.base_url.clone()
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    fn extract(&self, node: ElementRef<'_>) -> Option<Record> {
        Record {
            title: text_of(node, "span.article-title"),
            author: text_of(node, "span.article-author"),
            url: attr_of(node, "a[data-content-ignoreinteraction]", "href")
                .map(|href| absolute_url(&self.base_url, &href)),
            format: first_text_of(node, &["span[data-testid='product-type-sm']", "td.article-data"]),
            availability: text_of(node, "div.article-status"),
            ..Record::new(self.name.clone())
        }
        .non_empty()
    }
}

/// Bookshop backend driven through a browser
pub struct Noworzyn {
    scraper: InteractiveScraper<NoworzynSite>,
}

impl Noworzyn {
    pub fn new(scraper: InteractiveScraper<NoworzynSite>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl Backend for Noworzyn {
    fn name(&self) -> &str {
        self.scraper.profile().id()
    }

    fn about(&self) -> BackendAbout {
        BackendAbout::new()
            .website(self.scraper.profile().base_url.clone())
            .interactive(true)
    }

    /// Options are not supported by the storefront search and are ignored
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
