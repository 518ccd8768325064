//! Browser abstraction for sources that only render in a real browser.
//!
//! Defines the `BrowserSession` and `PageElement` traits that abstract over
//! the browser engine (Chromium via chromiumoxide in production, a scripted
//! fake in tests).

pub mod chromium;
mod slot;

#[cfg(test)]
pub(crate) mod fake;

pub use chromium::ChromiumFactory;
pub use slot::{SessionLease, SessionSlot};

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Launch options for a browser session
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    pub chrome_executable: Option<PathBuf>,
}

impl BrowserOptions {
    pub fn from_settings(settings: &crate::config::BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            window_width: settings.window_width,
            window_height: settings.window_height,
            user_agent: settings
                .user_agent
                .clone()
                .unwrap_or_else(|| crate::network::DESKTOP_CHROME.to_string()),
            chrome_executable: settings.chrome_executable.clone(),
        }
    }
}

/// One live, controllable browser tab.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Reload the current page.
    async fn refresh(&self) -> Result<()>;
    /// All elements matching a CSS selector, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
    /// Value of `document.readyState`.
    async fn ready_state(&self) -> Result<String>;
    /// Number of resources the page has finished loading.
    async fn loaded_resource_count(&self) -> Result<u64>;
    /// Current rendered markup.
    async fn content(&self) -> Result<String>;
    /// Write a PNG capture of the page to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;
    /// Whether the session still responds.
    async fn is_alive(&self) -> bool;
    /// Tear the session down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// An element handle inside a [`BrowserSession`].
#[async_trait]
pub trait PageElement: Send + Sync {
    async fn is_displayed(&self) -> Result<bool>;
    async fn is_enabled(&self) -> Result<bool>;
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    async fn click(&self) -> Result<()>;
    async fn scroll_into_view(&self) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    /// Simulated keystrokes.
    async fn type_text(&self, text: &str) -> Result<()>;
    async fn press_enter(&self) -> Result<()>;
    /// Assign `value` by script and fire `input` and `change`.
    async fn set_value_by_script(&self, value: &str) -> Result<()>;
    /// Submit the element's enclosing form by script.
    async fn submit_form(&self) -> Result<()>;
}

/// Creates browser sessions on demand.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn BrowserSession>>;
}
