//! Static HTML catalog fetched over plain HTTP

use super::traits::{option_value, Backend, BackendAbout, SearchOptions};
use crate::network::HttpClient;
use crate::results::Record;
use crate::scraping::text_of;
use anyhow::{bail, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Catalog whose result list is served as plain HTML.
///
/// `GET <base>/search?q=<term>&<options>`, one `.search-result-item` per hit.
pub struct HtmlCatalog {
    name: String,
    base_url: String,
    client: HttpClient,
}

impl HtmlCatalog {
    pub const DEFAULT_BASE_URL: &'static str = "https://example-library.com";

    pub fn new(name: impl Into<String>, base_url: impl Into<String>, client: HttpClient) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }

    fn parse_results(&self, html: &str) -> Vec<Record> {
        let document = Html::parse_document(html);
        let Ok(item_selector) = Selector::parse(".search-result-item") else {
            return Vec::new();
        };

        document
            .select(&item_selector)
            .filter_map(|item| self.extract_metadata(item))
            .collect()
    }
}

#[async_trait]
impl Backend for HtmlCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn about(&self) -> BackendAbout {
        BackendAbout::new().website(self.base_url.clone())
    }

    async fn search(&self, term: &str, options: &SearchOptions) -> Result<Vec<Record>> {
        let mut params = vec![("q".to_string(), term.to_string())];
        params.extend(
            options
                .iter()
                .filter_map(|(key, value)| option_value(value).map(|v| (key.clone(), v))),
        );

        let url = self.search_url();
        let page = self.client.get(&url, &params).await?;
        if !page.is_success() {
            warn!("{} returned HTTP {}", page.url, page.status);
            bail!("HTTP {} from {}", page.status, url);
        }

        let records = self.parse_results(&page.text);
        debug!("{}: parsed {} records", self.name, records.len());
        Ok(records)
    }

    fn extract_metadata(&self, node: ElementRef<'_>) -> Option<Record> {
        Record {
            title: text_of(node, ".title"),
            author: text_of(node, ".author"),
            year: text_of(node, ".year"),
            isbn: text_of(node, ".isbn"),
            availability: text_of(node, ".availability"),
            location: text_of(node, ".location"),
            ..Record::new(self.name.clone())
        }
        .non_empty()
    }
}
