//! Chromium backend built on `headless_chrome`.
//!
//! The driver is synchronous, so each operation runs on the blocking pool and
//! is bounded by a tokio timeout. One browser process per session keeps
//! cookies and storage isolated between concurrent units of work.
//!
//! A launcher can own a persistent profile directory so logins and consent
//! cookies survive between runs. Chrome locks a profile while a process uses
//! it, so only one session at a time holds the directory; sessions opened
//! meanwhile get a throwaway profile.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::DOM;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::{debug, info};

use super::{BrowserError, BrowserLauncher, BrowserPage, Session};

const WINDOW_SIZE: (u32, u32) = (1366, 900);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "de-DE,de;q=0.9,en;q=0.8";

pub struct ChromeLauncher {
    headless: bool,
    op_timeout: Duration,
    nav_timeout: Duration,
    profile: Option<ProfileSlot>,
}

impl ChromeLauncher {
    pub fn new(headless: bool, op_timeout: Duration, nav_timeout: Duration) -> Self {
        Self {
            headless,
            op_timeout,
            nav_timeout,
            profile: None,
        }
    }

    /// Reuses `dir` as the Chrome user data directory, created on first use.
    pub fn with_profile_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.profile = dir.map(ProfileSlot::new);
        self
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn open(&self) -> Result<Session, BrowserError> {
        let headless = self.headless;
        let lease = self.profile.as_ref().and_then(ProfileSlot::acquire);
        if self.profile.is_some() && lease.is_none() {
            debug!("Persistent profile in use, opening session with a temporary profile");
        }
        let user_data_dir = lease.as_ref().map(|l| l.dir.clone());

        let task = tokio::task::spawn_blocking(move || -> Result<_, BrowserError> {
            if let Some(dir) = &user_data_dir {
                std::fs::create_dir_all(dir).map_err(|e| {
                    BrowserError::Launch(format!("profile dir {}: {e}", dir.display()))
                })?;
            }
            let options = LaunchOptionsBuilder::default()
                .headless(headless)
                .window_size(Some(WINDOW_SIZE))
                .user_data_dir(user_data_dir)
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            tab.set_user_agent(USER_AGENT, Some(ACCEPT_LANGUAGE), None)
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            Ok((browser, tab))
        });

        let (browser, tab) = match tokio::time::timeout(self.nav_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => return Err(BrowserError::Launch(join.to_string())),
            Err(_) => {
                return Err(BrowserError::Timeout {
                    op: "launch",
                    after: self.nav_timeout,
                })
            }
        };

        match &lease {
            Some(l) => info!(
                "Browser session opened (headless={}, profile={})",
                self.headless,
                l.dir.display()
            ),
            None => info!("Browser session opened (headless={})", self.headless),
        }
        Ok(Session::new(Box::new(ChromePage {
            _browser: browser,
            _profile: lease,
            tab,
            op_timeout: self.op_timeout,
            nav_timeout: self.nav_timeout,
        })))
    }
}

/// A profile directory plus its in-use flag.
struct ProfileSlot {
    dir: PathBuf,
    busy: Arc<AtomicBool>,
}

impl ProfileSlot {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    fn acquire(&self) -> Option<ProfileLease> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProfileLease {
                dir: self.dir.clone(),
                busy: self.busy.clone(),
            })
    }
}

/// Frees the profile directory when the session holding it goes away.
struct ProfileLease {
    dir: PathBuf,
    busy: Arc<AtomicBool>,
}

impl Drop for ProfileLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

struct ChromePage {
    // Dropping the last handle terminates the browser process. The profile
    // lease is released after it.
    _browser: Browser,
    _profile: Option<ProfileLease>,
    tab: Arc<Tab>,
    op_timeout: Duration,
    nav_timeout: Duration,
}

impl ChromePage {
    async fn blocking<T, F>(
        &self,
        op: &'static str,
        limit: Duration,
        f: F,
    ) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, BrowserError> + Send + 'static,
    {
        let tab = self.tab.clone();
        let task = tokio::task::spawn_blocking(move || f(tab));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(BrowserError::Script(format!("{op} task failed: {join}"))),
            Err(_) => Err(BrowserError::Timeout { op, after: limit }),
        }
    }

    async fn eval(&self, op: &'static str, script: String) -> Result<serde_json::Value, BrowserError> {
        self.blocking(op, self.op_timeout, move |tab| {
            let remote = tab
                .evaluate(&script, false)
                .map_err(|e| driver_error(op, e))?;
            Ok(remote.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    /// Runs a script that returns `true` when its target element was found.
    async fn eval_on_element(
        &self,
        op: &'static str,
        selector: &str,
        script: String,
    ) -> Result<(), BrowserError> {
        match self.eval(op, script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to {url}");
        let target = url.to_string();
        self.blocking("goto", self.nav_timeout, move |tab| {
            tab.navigate_to(&target)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| BrowserError::Navigation {
                    url: target.clone(),
                    message: e.to_string(),
                })
        })
        .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.blocking("content", self.op_timeout, |tab| {
            tab.get_content().map_err(|e| driver_error("content", e))
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<bool, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             el.scrollIntoView({{block: 'center'}}); \
             el.click(); return true; }})()",
            sel = js_string(selector)
        );
        Ok(matches!(
            self.eval("click", script).await?,
            serde_json::Value::Bool(true)
        ))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        // The native setter keeps framework-managed inputs in sync.
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             el.focus(); \
             const proto = Object.getPrototypeOf(el); \
             const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (desc && desc.set) {{ desc.set.call(el, {val}); }} else {{ el.value = {val}; }} \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); \
             el.blur(); return true; }})()",
            sel = js_string(selector),
            val = js_string(value)
        );
        self.eval_on_element("fill", selector, script).await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             el.value = {val}; \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); \
             return true; }})()",
            sel = js_string(selector),
            val = js_string(value)
        );
        self.eval_on_element("select_option", selector, script).await
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             if (el.checked !== {checked}) el.click(); \
             return true; }})()",
            sel = js_string(selector)
        );
        self.eval_on_element("set_checked", selector, script).await
    }

    async fn set_input_files(
        &self,
        selector: &str,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        let sel = selector.to_string();
        let files: Vec<String> = files
            .iter()
            .map(|p| {
                std::fs::canonicalize(p)
                    .unwrap_or_else(|_| p.clone())
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        self.blocking("set_input_files", self.op_timeout, move |tab| {
            let element = tab
                .find_element(&sel)
                .map_err(|_| BrowserError::ElementNotFound(sel.clone()))?;
            tab.call_method(DOM::SetFileInputFiles {
                files,
                node_id: Some(element.node_id),
                backend_node_id: None,
                object_id: None,
            })
            .map(|_| ())
            .map_err(|e| driver_error("set_input_files", e))
        })
        .await
    }

    async fn scroll_to_end(&self) -> Result<u64, BrowserError> {
        let script = "(() => { window.scrollTo(0, document.body.scrollHeight); \
                      return document.body.scrollHeight; })()"
            .to_string();
        let height = self.eval("scroll_to_end", script).await?;
        Ok(height.as_u64().unwrap_or(0))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.blocking("close", self.op_timeout, |tab| {
            tab.close_target()
                .map(|_| ())
                .map_err(|e| driver_error("close", e))
        })
        .await
    }

    fn release(&self) {
        let tab = self.tab.clone();
        std::thread::spawn(move || {
            let _ = tab.close_target();
        });
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn driver_error(op: &'static str, e: anyhow::Error) -> BrowserError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        BrowserError::Timeout {
            op,
            after: Duration::ZERO,
        }
    } else if lower.contains("detached") || lower.contains("no node") {
        BrowserError::Detached(message)
    } else if lower.contains("connection is closed") || lower.contains("target closed") {
        BrowserError::Closed
    } else {
        BrowserError::Script(format!("{op}: {message}"))
    }
}
