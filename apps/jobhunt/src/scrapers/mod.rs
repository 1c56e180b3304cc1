//! Job board scrapers.
//!
//! Each board implements [`SourceScraper`]. A search opens one browser
//! session and walks the board's result pages eagerly to collect cards. The
//! returned [`SearchOutcome`] keeps the session; its posting stream fetches
//! each card's detail page on demand and closes the session after the last
//! one. Dropping the outcome or the stream early releases the session through
//! its guard.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;
use scraper::{ElementRef, Html};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{dom, with_retry, BrowserError, BrowserLauncher, RetryPolicy, Session};
use crate::models::{normalize_url, JobPosting, SearchQuery, Source};

pub mod linkedin;
pub mod stepstone;

pub use linkedin::LinkedInScraper;
pub use stepstone::StepStoneScraper;

pub type PostingStream = BoxStream<'static, JobPosting>;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("{board} unavailable: {reason}")]
    SourceUnavailable { board: Source, reason: String },

    #[error("{board} card dropped: {reason}")]
    Extraction { board: Source, reason: String },
}

/// Result of one search call. Cards are collected before this is returned;
/// descriptions are fetched lazily once the caller turns it into a stream,
/// so cards removed with [`SearchOutcome::retain`] never cost a navigation.
pub struct SearchOutcome {
    cards: Vec<JobPosting>,
    pub dropped_cards: usize,
    details: Option<DetailFetch>,
}

struct DetailFetch {
    session: Session,
    recipe: DetailRecipe,
    settings: ScrapeSettings,
}

impl SearchOutcome {
    /// Postings that need no detail fetch.
    pub fn listed(cards: Vec<JobPosting>) -> Self {
        Self {
            cards,
            dropped_cards: 0,
            details: None,
        }
    }

    pub(crate) fn browsed(
        collector: CardCollector,
        session: Session,
        recipe: DetailRecipe,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            cards: collector.postings,
            dropped_cards: collector.dropped,
            details: Some(DetailFetch {
                session,
                recipe,
                settings,
            }),
        }
    }

    pub fn cards(&self) -> &[JobPosting] {
        &self.cards
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&JobPosting) -> bool,
    {
        self.cards.retain(keep);
    }

    /// Yields the remaining cards in board order, each with its description.
    pub fn into_postings(self) -> PostingStream {
        match self.details {
            Some(fetch) => describe_lazily(fetch.session, self.cards, fetch.recipe, fetch.settings),
            None => Box::pin(futures::stream::iter(self.cards)),
        }
    }
}

#[async_trait]
pub trait SourceScraper: Send + Sync {
    fn source(&self) -> Source;

    /// Searches the board. At most `max_results` postings are yielded, in
    /// the order they appear on the board.
    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> Result<SearchOutcome, ScraperError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Hard cap on result pages (or scroll rounds) per search.
    pub page_cap: usize,
    pub retry: RetryPolicy,
    /// Pause after a navigation or scroll so lazy content can render.
    pub settle: Duration,
    /// Jittered pause between detail page fetches.
    pub detail_delay: (Duration, Duration),
    /// LinkedIn "posted within" filter.
    pub posted_within_days: Option<u32>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            page_cap: 20,
            retry: RetryPolicy::default(),
            settle: Duration::from_millis(2500),
            detail_delay: (Duration::from_secs(4), Duration::from_secs(8)),
            posted_within_days: None,
        }
    }
}

impl ScrapeSettings {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy {
                attempts: 2,
                backoff: Duration::ZERO,
            },
            settle: Duration::ZERO,
            detail_delay: (Duration::ZERO, Duration::ZERO),
            ..Self::default()
        }
    }

    fn jittered_detail_delay(&self) -> Duration {
        let (low, high) = self.detail_delay;
        if high <= low {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Card extraction
// ────────────────────────────────────────────────────────────────────────────

/// List-level fields read from one result card.
#[derive(Debug, Default)]
pub(crate) struct RawCard {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
}

impl RawCard {
    /// Title and url are mandatory; company and location may be empty.
    pub fn into_posting(self, board: Source) -> Result<JobPosting, ScraperError> {
        let title = self.title.filter(|t| !t.is_empty());
        let url = self.url.filter(|u| !u.is_empty());
        match (title, url) {
            (Some(title), Some(url)) => Ok(JobPosting {
                title,
                company: self.company.unwrap_or_default(),
                location: self.location.unwrap_or_default(),
                url: normalize_url(&url),
                source: board,
                description: None,
            }),
            (title, url) => Err(ScraperError::Extraction {
                board,
                reason: format!(
                    "missing {}",
                    match (title.is_some(), url.is_some()) {
                        (false, false) => "title and url",
                        (false, true) => "title",
                        _ => "url",
                    }
                ),
            }),
        }
    }
}

/// What a scraper reads from one listing page. Parsed synchronously so the
/// DOM never lives across an await.
pub(crate) struct ListingSnapshot {
    pub cards: Vec<RawCard>,
    pub hash: String,
    pub has_next: bool,
}

pub(crate) fn card_text(card: ElementRef<'_>, css: &str) -> Option<String> {
    dom::select_within(card, css)
        .map(dom::text_of)
        .filter(|t| !t.is_empty())
}

/// Accumulates postings across pages, skipping urls already collected.
pub(crate) struct CardCollector {
    board: Source,
    max: usize,
    seen: HashSet<String>,
    pub postings: Vec<JobPosting>,
    pub dropped: usize,
}

impl CardCollector {
    pub fn new(board: Source, max: usize) -> Self {
        Self {
            board,
            max,
            seen: HashSet::new(),
            postings: Vec::new(),
            dropped: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.postings.len() >= self.max
    }

    /// Adds the cards of one page; returns how many were new.
    pub fn absorb(&mut self, cards: Vec<RawCard>) -> usize {
        let mut added = 0;
        for card in cards {
            if self.is_full() {
                break;
            }
            match card.into_posting(self.board) {
                Ok(posting) => {
                    if self.seen.insert(posting.url.clone()) {
                        debug!("Extracted: {} at {}", posting.title, posting.company);
                        self.postings.push(posting);
                        added += 1;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                    self.dropped += 1;
                }
            }
        }
        added
    }
}

/// Second termination guarantee for pagination loops: a page cap plus
/// detection of a listing that stopped changing.
pub(crate) struct PageGuard {
    cap: usize,
    rounds: usize,
    hashes: HashSet<String>,
}

impl PageGuard {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            rounds: 0,
            hashes: HashSet::new(),
        }
    }

    /// Registers one page snapshot by content hash. `false` means stop:
    /// either the cap is reached or this exact content was seen before.
    pub fn admit(&mut self, hash: &str) -> bool {
        if self.rounds >= self.cap {
            info!("Page cap of {} reached", self.cap);
            return false;
        }
        self.rounds += 1;
        if !self.hashes.insert(hash.to_string()) {
            info!("Listing content repeated, assuming end of results");
            return false;
        }
        true
    }

    /// `true` once every allowed page has been admitted. Checked before
    /// loading another page so the cap is never exceeded.
    pub fn exhausted(&self) -> bool {
        self.rounds >= self.cap
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session helpers
// ────────────────────────────────────────────────────────────────────────────

pub(crate) async fn open_listing(
    launcher: &Arc<dyn BrowserLauncher>,
    board: Source,
    url: &str,
    settings: &ScrapeSettings,
) -> Result<Session, ScraperError> {
    let session = launcher
        .open()
        .await
        .map_err(|e| ScraperError::SourceUnavailable {
            board,
            reason: e.to_string(),
        })?;
    let loaded = with_retry(&format!("{board} search page"), settings.retry, || {
        session.goto(url)
    })
    .await;
    match loaded {
        Ok(()) => {
            settle(settings).await;
            Ok(session)
        }
        Err(e) => {
            session.close().await;
            Err(ScraperError::SourceUnavailable {
                board,
                reason: e.to_string(),
            })
        }
    }
}

pub(crate) async fn settle(settings: &ScrapeSettings) {
    if !settings.settle.is_zero() {
        tokio::time::sleep(settings.settle).await;
    }
}

/// How a board's detail page is turned into a description.
#[derive(Clone, Copy)]
pub(crate) struct DetailRecipe {
    /// "Show more" style controls, tried in order until one is clicked.
    pub expand: &'static [&'static str],
    pub extract: fn(&Html) -> Option<String>,
}

async fn fetch_description(
    session: &Session,
    url: &str,
    recipe: DetailRecipe,
    settings: &ScrapeSettings,
) -> Result<Option<String>, BrowserError> {
    with_retry("detail page", settings.retry, || session.goto(url)).await?;
    settle(settings).await;
    for selector in recipe.expand {
        match session.click(selector).await {
            Ok(true) => {
                debug!("Expanded description via {selector}");
                settle(settings).await;
                break;
            }
            Ok(false) => {}
            Err(e) => debug!("Expand control {selector} failed: {e}"),
        }
    }
    let html = session.content().await?;
    Ok((recipe.extract)(&Html::parse_document(&html)))
}

/// Lazily fetches detail pages for `postings`, rate-limited, one at a time.
/// A failed fetch yields the posting without a description.
pub(crate) fn describe_lazily(
    session: Session,
    postings: Vec<JobPosting>,
    recipe: DetailRecipe,
    settings: ScrapeSettings,
) -> PostingStream {
    Box::pin(stream! {
        for (index, posting) in postings.into_iter().enumerate() {
            if index > 0 {
                let delay = settings.jittered_detail_delay();
                if !delay.is_zero() {
                    debug!("Waiting {:.2}s before next detail request", delay.as_secs_f32());
                    tokio::time::sleep(delay).await;
                }
            }
            let description = match fetch_description(&session, &posting.url, recipe, &settings).await {
                Ok(Some(text)) => Some(text),
                Ok(None) => {
                    warn!(url = %posting.url, "No description container found");
                    None
                }
                Err(e) => {
                    warn!(url = %posting.url, "Detail fetch failed: {e}");
                    None
                }
            };
            yield posting.with_description(description);
        }
        session.close().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(title: Option<&str>, url: Option<&str>) -> RawCard {
        RawCard {
            title: title.map(String::from),
            company: Some("Acme".into()),
            location: None,
            url: url.map(String::from),
        }
    }

    #[test]
    fn test_card_without_title_or_url_is_dropped() {
        let mut collector = CardCollector::new(Source::LinkedIn, 10);
        let added = collector.absorb(vec![
            card(Some("Werkstudent IT"), Some("https://a.test/1")),
            card(None, Some("https://a.test/2")),
            card(Some("Werkstudent HR"), None),
        ]);
        assert_eq!(added, 1);
        assert_eq!(collector.dropped, 2);
        assert_eq!(collector.postings[0].location, "");
    }

    #[test]
    fn test_collector_skips_repeats_and_respects_max() {
        let mut collector = CardCollector::new(Source::StepStone, 2);
        collector.absorb(vec![card(Some("A"), Some("https://a.test/1?trk=x"))]);
        let added = collector.absorb(vec![
            card(Some("A"), Some("https://a.test/1")),
            card(Some("B"), Some("https://a.test/2")),
            card(Some("C"), Some("https://a.test/3")),
        ]);
        assert_eq!(added, 1);
        assert!(collector.is_full());
        let urls: Vec<&str> = collector.postings.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.test/1", "https://a.test/2"]);
    }

    #[test]
    fn test_page_guard_stops_on_repeat_and_cap() {
        let mut guard = PageGuard::new(3);
        assert!(guard.admit("a"));
        assert!(!guard.admit("a"));
        assert!(!guard.exhausted());

        let mut guard = PageGuard::new(3);
        assert!(guard.admit("a"));
        assert!(guard.admit("b"));
        assert!(guard.admit("c"));
        assert!(guard.exhausted());
        assert!(!guard.admit("d"));
        assert_eq!(guard.rounds(), 3);
    }
}
