//! HTTP client for backends that fetch static catalog pages

use super::user_agent::{accept_html, accept_language, generate_user_agent};
use crate::config::{seconds, OutgoingSettings};
use anyhow::Result;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched page
#[derive(Debug)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response URL (after redirects)
    pub url: String,
    /// Response body as text
    pub text: String,
}

impl FetchedPage {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client wrapper with catalog-friendly defaults
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let timeout = Some(settings.request_timeout)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| seconds("outgoing.request_timeout", secs))
            .unwrap_or(DEFAULT_TIMEOUT);
        let mut builder = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(settings.pool_maxsize)
            .cookie_store(true)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        Ok(Self {
            client: builder.build()?,
            user_agent: settings.user_agent.clone(),
        })
    }

    /// GET a page with query parameters
    pub async fn get(&self, url: &str, params: &[(String, String)]) -> Result<FetchedPage> {
        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(generate_user_agent);

        debug!("GET {} ({} params)", url, params.len());

        let response = self
            .client
            .get(url)
            .query(params)
            .header("User-Agent", user_agent)
            .header("Accept", accept_html())
            .header("Accept-Language", accept_language())
            .header("DNT", "1")
            .send()
            .await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let text = response.text().await?;

        Ok(FetchedPage { status, url, text })
    }
}
