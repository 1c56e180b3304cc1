//! Discovery run: every role × location combination against every board.
//!
//! Scrapers for one combination run concurrently, each in its own browser
//! session. Their card lists are then reduced in a single pass, in scraper
//! order, against the run-wide set of seen urls, and only the cards that
//! survive have their detail pages fetched.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{normalize_url, JobPosting, SearchQuery, Source};
use crate::scrapers::{ScraperError, SearchOutcome, SourceScraper};

pub mod filter;
pub mod roles;

pub use filter::FilterRule;

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: Source,
    pub query: SearchQuery,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub combinations: usize,
    pub searches: usize,
    pub source_failures: Vec<SourceFailure>,
    pub raw_postings: usize,
    pub dropped_cards: usize,
    pub kept: usize,
    pub missing_descriptions: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            "Discovery finished: {} combinations, {} searches, {} raw postings, {} kept \
             ({} without description), {} cards dropped, {} source failures",
            self.combinations,
            self.searches,
            self.raw_postings,
            self.kept,
            self.missing_descriptions,
            self.dropped_cards,
            self.source_failures.len()
        );
        for failure in &self.source_failures {
            warn!(
                "  {} unavailable for '{}' in '{}': {}",
                failure.source, failure.query.keywords, failure.query.location, failure.reason
            );
        }
    }

    fn all_searches_failed(&self) -> bool {
        self.searches > 0 && self.source_failures.len() == self.searches
    }
}

pub struct Discovery {
    pub postings: Vec<JobPosting>,
    pub summary: RunSummary,
}

pub struct DiscoveryOrchestrator {
    scrapers: Vec<Arc<dyn SourceScraper>>,
    rule: FilterRule,
    strict_roles: bool,
}

impl DiscoveryOrchestrator {
    pub fn new(scrapers: Vec<Arc<dyn SourceScraper>>, rule: FilterRule) -> Self {
        Self {
            scrapers,
            rule,
            strict_roles: true,
        }
    }

    /// Keep titles that only loosely match the role they were found under.
    pub fn with_strict_roles(mut self, strict: bool) -> Self {
        self.strict_roles = strict;
        self
    }

    /// Runs all combinations, location-major. Output preserves first-seen
    /// order and never repeats a url.
    pub async fn discover(
        &self,
        roles: &[String],
        locations: &[String],
        per_combo_limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Discovery, AppError> {
        let mut summary = RunSummary::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<JobPosting> = Vec::new();

        for location in locations {
            info!("=== Processing location: {location} ===");
            for (index, role) in roles.iter().enumerate() {
                let query = SearchQuery::new(role.as_str(), location.as_str());
                info!(
                    "Searching role ({}/{}): '{role}' in '{location}'",
                    index + 1,
                    roles.len()
                );
                summary.combinations += 1;

                let found = tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    found = self.run_combination(&query, per_combo_limit, &mut seen, &mut summary) => found,
                };
                info!(
                    "Added {} postings for '{role}' in '{location}'",
                    found.len()
                );
                merged.extend(found);
            }
        }

        if summary.all_searches_failed() {
            summary.log();
            return Err(AppError::DiscoveryFailed);
        }

        let postings = filter::apply(merged, &self.rule);
        summary.kept = postings.len();
        summary.missing_descriptions = postings.iter().filter(|p| p.description.is_none()).count();
        summary.log();
        Ok(Discovery { postings, summary })
    }

    async fn run_combination(
        &self,
        query: &SearchQuery,
        limit: usize,
        seen: &mut HashSet<String>,
        summary: &mut RunSummary,
    ) -> Vec<JobPosting> {
        let searches = self.scrapers.iter().map(|scraper| async move {
            let source = scraper.source();
            (source, scraper.search(query, limit).await)
        });
        let results: Vec<(Source, Result<SearchOutcome, ScraperError>)> =
            join_all(searches).await;

        let terms = roles::significant_terms(&query.keywords, &self.rule);
        let mut pending = Vec::new();
        for (source, result) in results {
            summary.searches += 1;
            match result {
                Ok(mut outcome) => {
                    summary.raw_postings += outcome.cards().len();
                    summary.dropped_cards += outcome.dropped_cards;
                    outcome.retain(|posting| {
                        let wanted = self.rule.matches(&posting.title)
                            && (!self.strict_roles
                                || roles::title_matches_role(&posting.title, &terms));
                        wanted && seen.insert(normalize_url(&posting.url))
                    });
                    pending.push(outcome);
                }
                Err(e) => {
                    warn!(
                        "{source} search failed for '{}' in '{}': {e}",
                        query.keywords, query.location
                    );
                    summary.source_failures.push(SourceFailure {
                        source,
                        query: query.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let described = join_all(
            pending
                .into_iter()
                .map(|outcome| outcome.into_postings().take(limit).collect::<Vec<_>>()),
        )
        .await;
        described.into_iter().flatten().collect()
    }
}
