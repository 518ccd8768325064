//! Interactive scraping of browser-rendered catalogs
//!
//! A [`SiteProfile`] describes one site (selectors, extraction, optional
//! login); [`InteractiveScraper`] drives it through a
//! [`ProtocolState`] machine on a reused browser session.

mod diagnostics;
mod error;
mod profile;
mod protocol;
mod wait;

pub use diagnostics::{DiagnosticArtifacts, DiagnosticsSink};
pub use error::ProtocolError;
pub use profile::{SelectorSet, SiteProfile};
pub use protocol::{InteractiveScraper, ProtocolState};
pub use wait::{is_interactable, pause, poll_for, PageWaiter, ProtocolTimings};

use scraper::{ElementRef, Selector};
use url::Url;

/// Trimmed text of the first descendant matching `css`, if non-empty
pub fn text_of(node: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    node.select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

/// Attribute of the first descendant matching `css`
pub fn attr_of(node: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    node.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// First non-empty text among several selector strategies
pub fn first_text_of(node: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| text_of(node, css))
}

/// Resolve a possibly relative link against the page it was found on
pub fn absolute_url(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), href),
    }
}
