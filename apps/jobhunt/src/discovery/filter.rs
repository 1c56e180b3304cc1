//! Title filter and cross-source url dedup.

use std::collections::{BTreeSet, HashSet};

use crate::models::{normalize_url, JobPosting};

pub const DEFAULT_INCLUDE: &[&str] = &["werkstudent", "working student"];

pub const DEFAULT_EXCLUDE: &[&str] = &[
    "senior",
    "lead",
    "principal",
    "sr.",
    "director",
    "intern",
    "internship",
    "praktikant",
    "praktikum",
    "ausbildung",
    "auszubildende",
];

/// Case-insensitive substring rule over titles. A title passes when it
/// contains at least one include term and no exclude term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl FilterRule {
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            include: normalize_terms(include),
            exclude: normalize_terms(exclude),
        }
    }

    pub fn include_terms(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(String::as_str)
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.include.iter().any(|term| title.contains(term.as_str()))
            && !self.exclude.iter().any(|term| title.contains(term.as_str()))
    }

    /// Whether `text` mentions any include term, ignoring the exclude list.
    pub fn mentions_include_term(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.include.iter().any(|term| text.contains(term.as_str()))
    }
}

impl Default for FilterRule {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE, DEFAULT_EXCLUDE)
    }
}

fn normalize_terms<I, S>(terms: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Dedups by normalized url (first occurrence wins), then applies `rule` to
/// the raw titles of the survivors. Order is preserved.
pub fn apply<I>(postings: I, rule: &FilterRule) -> Vec<JobPosting>
where
    I: IntoIterator<Item = JobPosting>,
{
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|posting| seen.insert(normalize_url(&posting.url)))
        .filter(|posting| rule.matches(&posting.title))
        .collect()
}
