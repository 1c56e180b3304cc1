//! Career-page resolver. Finds the company-hosted application page for a
//! board listing.
//!
//! Search and ranking are collaborators behind traits; the resolver owns the
//! candidate pre-ranking and the confidence threshold. Anything it is not
//! sure about comes back `Unresolved` and the attempt is left for manual review.

pub mod hiring_company;
pub mod prompts;
pub mod ranking;
pub mod search;

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::models::{normalize_url, JobPosting};
pub use ranking::{CandidateRanker, LlmRanker, RankedCandidate};
pub use search::{GoogleSearch, SearchHit, WebSearch};

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_MAX_CANDIDATES: usize = 5;
const SEARCH_RESULTS: usize = 10;

/// Hosts that only re-list postings; never an application target.
const AGGREGATOR_HOSTS: &[&str] = &[
    "linkedin", "stepstone", "xing", "indeed", "kimeta", "arbeitsagentur", "meinestadt",
    "monster", "jobrapido", "jobware", "glassdoor",
];

/// Applicant tracking systems that host company career pages.
const ATS_HOSTS: &[&str] = &[
    "workday", "join.com", "lever", "greenhouse", "icims", "taleo", "smartrecruiters", "onlyfy",
    "softgarden", "jobbase", "personio",
];

const JOB_PATH_HINTS: &[&str] = &["job", "karriere", "career", "stellen", "bewerb"];

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationUrl {
    pub url: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ApplicationUrl),
    /// Not confident enough to apply automatically.
    Unresolved { reason: String },
}

impl Resolution {
    fn unresolved(reason: impl Into<String>) -> Self {
        Resolution::Unresolved {
            reason: reason.into(),
        }
    }
}

pub struct CareerPageResolver {
    search: Arc<dyn WebSearch>,
    ranker: Arc<dyn CandidateRanker>,
    min_confidence: f64,
    max_candidates: usize,
}

impl CareerPageResolver {
    pub fn new(search: Arc<dyn WebSearch>, ranker: Arc<dyn CandidateRanker>) -> Self {
        Self {
            search,
            ranker,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Company name used for the search: the employer named in the description
    /// when a recruiter listed the posting, else the listed company.
    pub fn effective_company(posting: &JobPosting) -> String {
        posting
            .description
            .as_deref()
            .and_then(|d| hiring_company::extract(d, &posting.company))
            .inspect(|found| {
                info!(
                    listed = %posting.company,
                    %found,
                    "Description names a different hiring company"
                )
            })
            .unwrap_or_else(|| posting.company.clone())
    }

    pub fn search_query(company: &str, title: &str) -> String {
        format!("\"{company}\" \"{title}\" careers OR jobs")
    }

    pub async fn resolve(&self, posting: &JobPosting) -> Resolution {
        let company = Self::effective_company(posting);
        if company.trim().is_empty() {
            return Resolution::unresolved("posting names no company");
        }

        let query = Self::search_query(&company, &posting.title);
        let hits = match self.search.search(&query, SEARCH_RESULTS).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(url = %posting.url, "Career-page search failed: {e}");
                return Resolution::unresolved(format!("search failed: {e}"));
            }
        };

        let candidates = prerank(hits, &company, self.max_candidates);
        if candidates.is_empty() {
            return Resolution::unresolved("no candidate pages outside job boards");
        }

        let pick = match self.ranker.rank(&company, &posting.title, &candidates).await {
            Ok(Some(pick)) => pick,
            Ok(None) => return Resolution::unresolved("ranker found no matching page"),
            Err(e) => {
                warn!(url = %posting.url, "Career-page ranking failed: {e}");
                return Resolution::unresolved(format!("ranking failed: {e}"));
            }
        };

        let picked = normalize_url(&pick.url);
        if !candidates.iter().any(|c| c.link == picked) {
            warn!(url = %pick.url, "Ranker chose a url that was not offered");
            return Resolution::unresolved("ranker chose a url that was not offered");
        }
        if pick.confidence < self.min_confidence {
            info!(
                url = %picked,
                confidence = pick.confidence,
                threshold = self.min_confidence,
                "Career page below confidence threshold"
            );
            return Resolution::unresolved(format!(
                "confidence {:.2} below {:.2}",
                pick.confidence, self.min_confidence
            ));
        }

        info!(url = %picked, confidence = pick.confidence, "Resolved career page");
        Resolution::Resolved(ApplicationUrl {
            url: picked,
            confidence: pick.confidence,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate pre-ranking
// ────────────────────────────────────────────────────────────────────────────

/// Drops job-board hits, normalises and dedupes links, and orders the rest:
/// known ATS hosts first, then hosts carrying the company name, then pages
/// whose path looks like a job page. Ties keep search order.
pub fn prerank(hits: Vec<SearchHit>, company: &str, keep: usize) -> Vec<SearchHit> {
    let slug = company_slug(company);
    let mut seen = HashSet::new();

    let mut scored: Vec<(u32, SearchHit)> = hits
        .into_iter()
        .filter_map(|mut hit| {
            let url = Url::parse(hit.link.trim()).ok()?;
            let host = url.host_str()?.to_lowercase();
            if AGGREGATOR_HOSTS.iter().any(|a| host.contains(a)) {
                return None;
            }
            hit.link = normalize_url(url.as_str());
            if !seen.insert(hit.link.clone()) {
                return None;
            }
            Some((score(&host, &url.path().to_lowercase(), &slug), hit))
        })
        .collect();

    scored.sort_by_key(|(score, _)| Reverse(*score));
    scored.into_iter().take(keep).map(|(_, hit)| hit).collect()
}

fn score(host: &str, path: &str, slug: &CompanySlug) -> u32 {
    let mut score = 0;
    if ATS_HOSTS.iter().any(|ats| host.contains(ats)) {
        score += 4;
    }
    if slug.matches(host) {
        score += 2;
    }
    if JOB_PATH_HINTS.iter().any(|hint| path.contains(hint)) {
        score += 1;
    }
    score
}

struct CompanySlug {
    joined: String,
    first_word: Option<String>,
}

impl CompanySlug {
    fn matches(&self, host: &str) -> bool {
        let host: String = host.chars().filter(|c| c.is_alphanumeric()).collect();
        (!self.joined.is_empty() && host.contains(&self.joined))
            || self.first_word.as_ref().is_some_and(|w| host.contains(w.as_str()))
    }
}

fn company_slug(company: &str) -> CompanySlug {
    let words: Vec<String> = company
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty() && !matches!(w.as_str(), "gmbh" | "ag" | "se" | "kg" | "inc" | "ltd" | "co" | "mbh"))
        .collect();
    CompanySlug {
        joined: words.concat(),
        first_word: words.first().filter(|w| w.chars().count() >= 4).cloned(),
    }
}
