//! Scripted in-memory browser for tests.
//!
//! A site is a list of HTML pages. Element lookups run real CSS selectors
//! against the current page; `data-*` attributes on elements script what
//! happens when they are used:
//!
//! * `data-goto="N"` - clicking switches to page N
//! * `data-submit-goto="N"` - pressing Enter switches to page N
//! * `data-form-goto="N"` - submitting the enclosing form switches to page N
//! * `data-reject-keys`, `data-reject-enter`, `data-fail-click` - the action errors
//! * `hidden` or `style="display: none"` - not displayed; `disabled` - not enabled

use super::{BrowserSession, PageElement, SessionFactory};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSite {
    pages: Vec<String>,
    routes: Vec<(String, usize)>,
}

impl FakeSite {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            routes: Vec::new(),
        }
    }

    pub fn single(page: &str) -> Self {
        Self::new(&[page])
    }

    /// Navigating to a URL containing `fragment` lands on `page`
    pub fn route(mut self, fragment: &str, page: usize) -> Self {
        self.routes.push((fragment.to_string(), page));
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeState {
    pub site: FakeSite,
    pub current: usize,
    /// Pages entered by navigation or scripted actions, in order
    pub visited: Vec<usize>,
    pub navigations: Vec<String>,
    pub refreshes: usize,
    pub typed: Vec<String>,
    pub clicks: Vec<String>,
    pub screenshots: Vec<PathBuf>,
    pub alive: bool,
}

impl FakeState {
    fn new(site: FakeSite) -> Self {
        Self {
            site,
            current: 0,
            visited: Vec::new(),
            navigations: Vec::new(),
            refreshes: 0,
            typed: Vec::new(),
            clicks: Vec::new(),
            screenshots: Vec::new(),
            alive: true,
        }
    }

    fn goto(&mut self, page: usize) {
        self.current = page;
        self.visited.push(page);
    }

    fn page(&self) -> &str {
        self.site
            .pages
            .get(self.current)
            .map(String::as_str)
            .unwrap_or("")
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct FakeFactory {
    site: FakeSite,
    failure: Option<String>,
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
    sessions: Mutex<Vec<Shared>>,
}

impl FakeFactory {
    pub fn new(site: FakeSite) -> Arc<Self> {
        Arc::new(Self {
            site,
            failure: None,
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            site: FakeSite::default(),
            failure: Some(message.to_string()),
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark every session handed out so far as unresponsive
    pub fn kill_sessions(&self) {
        for state in self.sessions.lock().unwrap().iter() {
            lock(state).alive = false;
        }
    }

    /// State of the most recently created session
    pub fn snapshot(&self) -> FakeState {
        let sessions = self.sessions.lock().unwrap();
        let state = sessions.last().expect("no session created");
        let snapshot = lock(state).clone();
        snapshot
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>> {
        if let Some(ref message) = self.failure {
            bail!("{}", message);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let state = Arc::new(Mutex::new(FakeState::new(self.site.clone())));
        self.sessions.lock().unwrap().push(state.clone());
        Ok(Box::new(FakeSession {
            state,
            closed: self.closed.clone(),
        }))
    }
}

struct FakeSession {
    state: Shared,
    closed: Arc<AtomicUsize>,
}

fn matching_elements(html: &str, css: &str) -> Result<Vec<HashMap<String, String>>> {
    let selector = Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e:?}"))?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&selector)
        .map(|el| {
            el.value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .collect())
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = lock(&self.state);
        let page = state
            .site
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, page)| *page)
            .unwrap_or(0);
        state.navigations.push(url.to_string());
        state.goto(page);
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        lock(&self.state).refreshes += 1;
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let page = lock(&self.state).page().to_string();
        let elements = matching_elements(&page, selector)?;
        Ok(elements
            .into_iter()
            .map(|attrs| {
                Box::new(FakeElement {
                    state: self.state.clone(),
                    attrs,
                }) as Box<dyn PageElement>
            })
            .collect())
    }

    async fn ready_state(&self) -> Result<String> {
        Ok("complete".to_string())
    }

    async fn loaded_resource_count(&self) -> Result<u64> {
        Ok(1)
    }

    async fn content(&self) -> Result<String> {
        Ok(lock(&self.state).page().to_string())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, b"\x89PNG fake").await?;
        lock(&self.state).screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        lock(&self.state).alive
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeElement {
    state: Shared,
    attrs: HashMap<String, String>,
}

impl FakeElement {
    fn has(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    fn target(&self, name: &str) -> Option<usize> {
        self.attrs.get(name).and_then(|v| v.parse().ok())
    }

    fn label(&self) -> String {
        self.attrs
            .get("id")
            .or_else(|| self.attrs.get("class"))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PageElement for FakeElement {
    async fn is_displayed(&self) -> Result<bool> {
        let hidden_style = self
            .attrs
            .get("style")
            .map_or(false, |s| s.replace(' ', "").contains("display:none"));
        Ok(!self.has("hidden") && !hidden_style)
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(!self.has("disabled"))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.attrs.get(name).cloned())
    }

    async fn click(&self) -> Result<()> {
        if self.has("data-fail-click") {
            bail!("element click intercepted");
        }
        let mut state = lock(&self.state);
        state.clicks.push(self.label());
        if let Some(page) = self.target("data-goto") {
            state.goto(page);
        }
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        if self.has("data-reject-keys") {
            bail!("element not interactable");
        }
        lock(&self.state).typed.push(text.to_string());
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        if self.has("data-reject-enter") {
            bail!("element not interactable");
        }
        if let Some(page) = self.target("data-submit-goto") {
            lock(&self.state).goto(page);
        }
        Ok(())
    }

    async fn set_value_by_script(&self, value: &str) -> Result<()> {
        lock(&self.state).typed.push(format!("script:{value}"));
        Ok(())
    }

    async fn submit_form(&self) -> Result<()> {
        match self.target("data-form-goto") {
            Some(page) => {
                lock(&self.state).goto(page);
                Ok(())
            }
            None => bail!("input has no enclosing form"),
        }
    }
}
