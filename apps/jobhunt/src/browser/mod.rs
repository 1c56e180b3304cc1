//! Browser automation seam.
//!
//! Every unit of work (one scraper call, one application attempt) opens its own
//! `Session` through a `BrowserLauncher`. Sessions never share a page, and a
//! session is released on every exit path: `Session::close` on the normal path,
//! `Drop` when the owning task is cancelled or returns early.

use std::future::Future;
use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub mod chrome;
pub mod dom;
#[cfg(test)]
pub mod fake;

pub use chrome::ChromeLauncher;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("Element detached: {0}")]
    Detached(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("Browser session closed")]
    Closed,
}

impl BrowserError {
    /// Timeouts, detached elements and failed navigations are worth another try.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrowserError::Timeout { .. }
                | BrowserError::Detached(_)
                | BrowserError::Navigation { .. }
        )
    }
}

/// A single page inside an isolated browser context.
///
/// Element arguments are CSS selectors (see [`dom::element_selector`]).
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Serialised DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Clicks the first element matching `selector`; `Ok(false)` when none matches.
    async fn click(&self, selector: &str) -> Result<bool, BrowserError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Selects the option whose value attribute equals `value`.
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), BrowserError>;

    async fn set_input_files(&self, selector: &str, files: &[PathBuf])
        -> Result<(), BrowserError>;

    /// Scrolls to the bottom of the document and returns the document height.
    async fn scroll_to_end(&self) -> Result<u64, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;

    /// Synchronous, best-effort teardown used when a session is dropped unclosed.
    fn release(&self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self) -> Result<Session, BrowserError>;
}

/// Owned browser page with guaranteed release.
pub struct Session {
    page: Box<dyn BrowserPage>,
    released: bool,
}

impl Session {
    pub fn new(page: Box<dyn BrowserPage>) -> Self {
        Self {
            page,
            released: false,
        }
    }

    pub async fn close(mut self) {
        self.released = true;
        if let Err(e) = self.page.close().await {
            warn!("Error closing browser session: {e}");
        }
    }
}

impl Deref for Session {
    type Target = dyn BrowserPage;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.released {
            debug!("Browser session dropped without close, releasing");
            self.page.release();
        }
    }
}

/// Retry policy for transient browser failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(750),
        }
    }
}

/// Runs `op` up to `policy.attempts` times while it fails transiently.
pub async fn with_retry<T, F, Fut>(
    what: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrowserError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    "{what} failed (attempt {attempt}/{attempts}): {e}; retrying in {}ms",
                    policy.backoff.as_millis()
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
