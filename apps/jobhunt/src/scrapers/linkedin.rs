//! LinkedIn guest job search. Results load by infinite scroll.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{info, warn};
use url::form_urlencoded;

use super::{
    card_text, open_listing, settle, CardCollector, DetailRecipe, ListingSnapshot, PageGuard,
    RawCard, ScrapeSettings, ScraperError, SearchOutcome, SourceScraper,
};
use crate::browser::{dom, BrowserLauncher, Session};
use crate::models::{SearchQuery, Source};

const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";

const CARD: &str = "ul.jobs-search__results-list > li div.base-card";
const TITLE: &str = "h3.base-search-card__title";
const COMPANY_LINK: &str = "h4.base-search-card__subtitle a";
const COMPANY: &str = "h4.base-search-card__subtitle";
const LOCATION: &str = "span.job-search-card__location";
const LINK: &str = "a.base-card__full-link";

const SHOW_MORE: &[&str] = &[
    "button[aria-label='Show more, visually expands previously read content below']",
    "button.show-more-less-html__button--more",
    "button[data-tracking-control-name='public_jobs_show-more-html-btn']",
];

const DESCRIPTION: &[&str] = &[
    "div.show-more-less-html__markup",
    "div#job-details",
    "section.core-section-container",
    "div.description__text",
];

const RECIPE: DetailRecipe = DetailRecipe {
    expand: SHOW_MORE,
    extract: extract_description,
};

pub struct LinkedInScraper {
    launcher: Arc<dyn BrowserLauncher>,
    settings: ScrapeSettings,
}

impl LinkedInScraper {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: ScrapeSettings) -> Self {
        Self { launcher, settings }
    }

    pub fn search_url(query: &SearchQuery, posted_within_days: Option<u32>) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());
        params
            .append_pair("keywords", &query.keywords)
            .append_pair("location", &query.location)
            .append_pair("start", "0");
        if let Some(days) = posted_within_days.filter(|d| *d > 0) {
            params.append_pair("f_TPR", &format!("r{}", u64::from(days) * 24 * 60 * 60));
        }
        format!("{SEARCH_URL}?{}", params.finish())
    }

    async fn collect_cards(&self, session: &Session, max_results: usize) -> CardCollector {
        let mut collector = CardCollector::new(Source::LinkedIn, max_results);
        let mut guard = PageGuard::new(self.settings.page_cap);
        let mut last_height = 0;

        loop {
            let html = match session.content().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("LinkedIn: could not read result list: {e}");
                    break;
                }
            };
            let snapshot = parse_listing(&html);
            if !guard.admit(&snapshot.hash) {
                break;
            }
            let found = snapshot.cards.len();
            let added = collector.absorb(snapshot.cards);
            info!(
                "LinkedIn: {found} cards visible, {added} new ({}/{max_results})",
                collector.postings.len()
            );
            if collector.is_full() {
                break;
            }
            if guard.exhausted() {
                info!("LinkedIn: scroll cap reached after {} rounds", guard.rounds());
                break;
            }

            let height = match session.scroll_to_end().await {
                Ok(height) => height,
                Err(e) => {
                    warn!("LinkedIn: scroll failed: {e}");
                    break;
                }
            };
            settle(&self.settings).await;
            if height == last_height && added == 0 {
                info!("LinkedIn: scroll height unchanged, assuming end of results");
                break;
            }
            last_height = height;
        }
        collector
    }
}

#[async_trait]
impl SourceScraper for LinkedInScraper {
    fn source(&self) -> Source {
        Source::LinkedIn
    }

    async fn search(
        &self,
        query: &SearchQuery,
        max_results: usize,
    ) -> Result<SearchOutcome, ScraperError> {
        let url = Self::search_url(query, self.settings.posted_within_days);
        info!(source = "LinkedIn", %url, "Searching");

        let session = open_listing(&self.launcher, Source::LinkedIn, &url, &self.settings).await?;
        let collector = self.collect_cards(&session, max_results).await;
        info!(
            "LinkedIn: collected {} postings for '{}' in '{}'",
            collector.postings.len(),
            query.keywords,
            query.location
        );

        Ok(SearchOutcome::browsed(collector, session, RECIPE, self.settings.clone()))
    }
}

fn parse_listing(html: &str) -> ListingSnapshot {
    let doc = Html::parse_document(html);
    let cards = dom::select_all(&doc, CARD)
        .into_iter()
        .map(|card| RawCard {
            title: card_text(card, TITLE),
            company: card_text(card, COMPANY_LINK).or_else(|| card_text(card, COMPANY)),
            location: card_text(card, LOCATION),
            url: dom::select_within(card, LINK)
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
        })
        .collect();
    ListingSnapshot {
        cards,
        hash: dom::content_hash(&doc),
        has_next: false,
    }
}

fn extract_description(doc: &Html) -> Option<String> {
    DESCRIPTION
        .iter()
        .find_map(|css| dom::select_first(doc, css))
        .map(dom::element_to_text)
        .filter(|text| !text.is_empty())
}
