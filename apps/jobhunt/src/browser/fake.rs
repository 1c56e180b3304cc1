//! Scripted in-memory browser for tests.
//!
//! A `FakeSite` maps URLs to HTML. Pages can expose several scroll snapshots,
//! clicks can navigate or replace the document, and navigations can be made to
//! fail a fixed number of times. Every action is recorded in a shared log.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;

use super::dom;
use super::{BrowserError, BrowserLauncher, BrowserPage, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Goto(String),
    Click(String),
    Fill(String, String),
    Select(String, String),
    Check(String, bool),
    Upload(String, Vec<PathBuf>),
    Scroll,
}

#[derive(Debug, Clone)]
pub enum ClickEffect {
    Navigate(String),
    Replace(String),
    Nothing,
}

#[derive(Debug, Clone)]
struct ClickRule {
    url: String,
    selector: String,
    effect: ClickEffect,
}

#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, Vec<String>>,
    clicks: Vec<ClickRule>,
    flaky: Mutex<HashMap<String, usize>>,
    unreachable: HashSet<String>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), vec![html.to_string()]);
        self
    }

    /// Page whose content grows with each `scroll_to_end`.
    pub fn scrolling_page(mut self, url: &str, snapshots: Vec<String>) -> Self {
        self.pages.insert(url.to_string(), snapshots);
        self
    }

    pub fn on_click(mut self, url: &str, selector: &str, effect: ClickEffect) -> Self {
        self.clicks.push(ClickRule {
            url: url.to_string(),
            selector: selector.to_string(),
            effect,
        });
        self
    }

    /// The first `failures` navigations to `url` time out.
    pub fn flaky(self, url: &str, failures: usize) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(url.to_string(), failures);
        }
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct FakeLog {
    pub opened: usize,
    pub released: usize,
    pub actions: Vec<Action>,
}

impl FakeLog {
    pub fn gotos(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Goto(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    site: Arc<FakeSite>,
    log: Arc<Mutex<FakeLog>>,
    fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
            log: Arc::new(Mutex::new(FakeLog::default())),
            fail_launch: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new(FakeSite::new())
        }
    }

    pub fn log(&self) -> FakeLog {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn open(&self) -> Result<Session, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::Launch("no browser in test".into()));
        }
        if let Ok(mut log) = self.log.lock() {
            log.opened += 1;
        }
        Ok(Session::new(Box::new(FakePage {
            site: self.site.clone(),
            log: self.log.clone(),
            state: Mutex::new(PageState::default()),
        })))
    }
}

#[derive(Default)]
struct PageState {
    url: Option<String>,
    snapshot: usize,
    replaced: Option<String>,
    closed: bool,
}

struct FakePage {
    site: Arc<FakeSite>,
    log: Arc<Mutex<FakeLog>>,
    state: Mutex<PageState>,
}

impl FakePage {
    fn record(&self, action: Action) {
        if let Ok(mut log) = self.log.lock() {
            log.actions.push(action);
        }
    }

    fn html(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().map_err(|_| BrowserError::Closed)?;
        if state.closed {
            return Err(BrowserError::Closed);
        }
        if let Some(html) = &state.replaced {
            return Ok(html.clone());
        }
        let url = state.url.clone().unwrap_or_default();
        Ok(self
            .site
            .pages
            .get(&url)
            .and_then(|snapshots| {
                snapshots
                    .get(state.snapshot)
                    .or_else(|| snapshots.last())
                    .cloned()
            })
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    fn has_element(&self, selector: &str) -> Result<bool, BrowserError> {
        let doc = Html::parse_document(&self.html()?);
        Ok(dom::exists(&doc, selector))
    }

    fn require_element(&self, selector: &str) -> Result<(), BrowserError> {
        if self.has_element(selector)? {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().map_err(|_| BrowserError::Closed)?;
        state.url = Some(url.to_string());
        state.snapshot = 0;
        state.replaced = None;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.record(Action::Goto(url.to_string()));
        if self.site.unreachable.contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".into(),
            });
        }
        if let Ok(mut flaky) = self.site.flaky.lock() {
            if let Some(remaining) = flaky.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BrowserError::Timeout {
                        op: "goto",
                        after: Duration::from_secs(30),
                    });
                }
            }
        }
        if !self.site.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "404".into(),
            });
        }
        self.navigate(url)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().map_err(|_| BrowserError::Closed)?;
        Ok(state.url.clone().unwrap_or_else(|| "about:blank".into()))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.html()
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        if !self.has_element(selector)? {
            return Ok(false);
        }
        self.record(Action::Click(selector.to_string()));
        let url = self.current_url().await?;
        let effect = self
            .site
            .clicks
            .iter()
            .find(|rule| rule.url == url && rule.selector == selector)
            .map(|rule| rule.effect.clone())
            .unwrap_or(ClickEffect::Nothing);
        match effect {
            ClickEffect::Navigate(target) => self.navigate(&target)?,
            ClickEffect::Replace(html) => {
                let mut state = self.state.lock().map_err(|_| BrowserError::Closed)?;
                state.replaced = Some(html);
            }
            ClickEffect::Nothing => {}
        }
        Ok(true)
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.require_element(selector)?;
        self.record(Action::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.require_element(selector)?;
        self.record(Action::Select(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), BrowserError> {
        self.require_element(selector)?;
        self.record(Action::Check(selector.to_string(), checked));
        Ok(())
    }

    async fn set_input_files(
        &self,
        selector: &str,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        self.require_element(selector)?;
        self.record(Action::Upload(selector.to_string(), files.to_vec()));
        Ok(())
    }

    async fn scroll_to_end(&self) -> Result<u64, BrowserError> {
        self.record(Action::Scroll);
        let mut state = self.state.lock().map_err(|_| BrowserError::Closed)?;
        let url = state.url.clone().unwrap_or_default();
        let snapshots = self.site.pages.get(&url).map(Vec::len).unwrap_or(1);
        if state.snapshot + 1 < snapshots {
            state.snapshot += 1;
        }
        let height = self
            .site
            .pages
            .get(&url)
            .and_then(|s| s.get(state.snapshot))
            .map(|html| html.len() as u64)
            .unwrap_or(0);
        Ok(height)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.release();
        Ok(())
    }

    fn release(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.closed {
                return;
            }
            state.closed = true;
        }
        if let Ok(mut log) = self.log.lock() {
            log.released += 1;
        }
    }
}
