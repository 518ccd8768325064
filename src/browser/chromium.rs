//! Chromium-backed browser sessions using chromiumoxide.

use super::{BrowserOptions, BrowserSession, PageElement, SessionFactory};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Find a Chromium or Chrome binary on this machine.
pub fn find_chromium() -> Option<PathBuf> {
    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Launches one headless Chromium per session.
pub struct ChromiumFactory {
    options: BrowserOptions,
}

impl ChromiumFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.options.window_width, self.options.window_height)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.options.user_agent));

        if !self.options.headless {
            builder = builder.with_head();
        }

        if let Some(path) = self
            .options
            .chrome_executable
            .clone()
            .or_else(find_chromium)
        {
            builder = builder.chrome_executable(path);
        }

        builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>> {
        let (mut browser, mut handler) = Browser::launch(self.config()?)
            .await
            .context("failed to launch Chromium")?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Box::new(ChromiumSession {
                browser: Mutex::new(browser),
                page,
                events,
            })),
            Err(e) => {
                // tear down the half-started browser before reporting
                let _ = browser.close().await;
                let _ = browser.wait().await;
                events.abort();
                Err(anyhow!(e).context("failed to open browser tab"))
            }
        }
    }
}

/// A Chromium process with one tab.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    events: JoinHandle<()>,
}

impl ChromiumSession {
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .with_context(|| format!("script failed: {script}"))?;
        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert script result: {e:?}"))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.page.reload().await.context("reload failed")?;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let elements = self.page.find_elements(selector).await?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn PageElement>)
            .collect())
    }

    async fn ready_state(&self) -> Result<String> {
        self.evaluate("document.readyState").await
    }

    async fn loaded_resource_count(&self) -> Result<u64> {
        self.evaluate("window.performance.getEntriesByType('resource').length")
            .await
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page.save_screenshot(params, path).await?;
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        match self.evaluate::<u64>("1 + 1").await {
            Ok(2) => true,
            Ok(_) => false,
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let Self {
            browser,
            page,
            events,
        } = *self;
        let mut browser = browser.into_inner();

        if let Err(e) = page.close().await {
            debug!("Closing tab failed: {}", e);
        }
        let closed = browser.close().await;
        let _ = browser.wait().await;
        events.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}

/// Element handle backed by a CDP remote object.
pub struct ChromiumElement {
    element: Element,
}

impl ChromiumElement {
    /// Run `function` with `this` bound to the element.
    async fn call(&self, function: &str) -> Result<Option<serde_json::Value>> {
        let returns = self.element.call_js_fn(function, false).await?;
        if let Some(details) = returns.exception_details {
            bail!("script raised: {}", details.text);
        }
        Ok(returns.result.value)
    }

    async fn call_bool(&self, function: &str) -> Result<bool> {
        Ok(self
            .call(function)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn is_displayed(&self) -> Result<bool> {
        self.call_bool(
            "function() { \
                const style = window.getComputedStyle(this); \
                const rect = this.getBoundingClientRect(); \
                return style.display !== 'none' && style.visibility !== 'hidden' \
                    && rect.width > 0 && rect.height > 0; \
            }",
        )
        .await
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.call_bool("function() { return !this.disabled; }").await
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.element.attribute(name).await?)
    }

    async fn click(&self) -> Result<()> {
        self.element.click().await?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        self.call("function() { this.scrollIntoView({ block: 'center' }); }")
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.call(
            "function() { \
                this.value = ''; \
                this.dispatchEvent(new Event('input', { bubbles: true })); \
            }",
        )
        .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.element.focus().await?;
        self.element.type_str(text).await?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        self.element.press_key("Enter").await?;
        Ok(())
    }

    async fn set_value_by_script(&self, value: &str) -> Result<()> {
        let literal = serde_json::to_string(value)?;
        self.call(&format!(
            "function() {{ \
                this.value = {literal}; \
                this.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
            }}"
        ))
        .await?;
        Ok(())
    }

    async fn submit_form(&self) -> Result<()> {
        self.call(
            "function() { \
                if (!this.form) { throw new Error('input has no enclosing form'); } \
                this.form.submit(); \
            }",
        )
        .await?;
        Ok(())
    }
}
