use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::prompts::RANK_CANDIDATES_PROMPT_TEMPLATE;
use super::search::SearchHit;
use crate::errors::CollaboratorError;
use crate::llm_client::{prompts::JSON_ONLY_SYSTEM, LlmClient};

/// The ranker's pick among the offered candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub url: String,
    pub confidence: f64,
}

/// Picks the most likely official application page among search candidates.
/// `Ok(None)` means no candidate fits.
///
/// Carried in `AppState` as `Arc<dyn CandidateRanker>`.
#[async_trait]
pub trait CandidateRanker: Send + Sync {
    async fn rank(
        &self,
        company: &str,
        title: &str,
        candidates: &[SearchHit],
    ) -> Result<Option<RankedCandidate>, CollaboratorError>;
}

/// Claude-backed ranker. Without an API key every call is `NotConfigured`.
pub struct LlmRanker {
    llm: Option<LlmClient>,
}

#[derive(Deserialize)]
struct RankingAnswer {
    url: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl LlmRanker {
    pub fn new(llm: Option<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CandidateRanker for LlmRanker {
    async fn rank(
        &self,
        company: &str,
        title: &str,
        candidates: &[SearchHit],
    ) -> Result<Option<RankedCandidate>, CollaboratorError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("LLM candidate ranking"))?;

        let prompt = RANK_CANDIDATES_PROMPT_TEMPLATE
            .replace("{company}", company)
            .replace("{title}", title)
            .replace("{candidates}", &format_candidates(candidates));
        let answer: RankingAnswer = llm.call_json(&prompt, JSON_ONLY_SYSTEM).await?;
        debug!(url = ?answer.url, confidence = answer.confidence, "Ranker answered");

        Ok(answer.into_candidate())
    }
}

impl RankingAnswer {
    fn into_candidate(self) -> Option<RankedCandidate> {
        let url = self.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(RankedCandidate { url, confidence })
    }
}

fn format_candidates(candidates: &[SearchHit]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. Title: {}\n   Link: {}\n   Snippet: {}",
                i + 1,
                hit.title,
                hit.link,
                hit.snippet.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_confidence_is_clamped() {
        let answer: RankingAnswer =
            serde_json::from_str(r#"{"url": "https://acme.de/jobs", "confidence": 1.7}"#).unwrap();
        assert_eq!(answer.into_candidate().unwrap().confidence, 1.0);
    }

    #[test]
    fn test_null_or_blank_url_is_no_pick() {
        let answer: RankingAnswer =
            serde_json::from_str(r#"{"url": null, "confidence": 0.9}"#).unwrap();
        assert!(answer.into_candidate().is_none());
        let answer: RankingAnswer = serde_json::from_str(r#"{"url": "  "}"#).unwrap();
        assert!(answer.into_candidate().is_none());
    }

    #[test]
    fn test_candidates_are_numbered() {
        let hits = vec![
            SearchHit {
                title: "Karriere".into(),
                link: "https://acme.de/karriere".into(),
                snippet: "Offene\nStellen".into(),
            },
            SearchHit {
                title: "Jobs".into(),
                link: "https://acme.jobs.personio.de".into(),
                snippet: String::new(),
            },
        ];
        let text = format_candidates(&hits);
        assert!(text.starts_with("1. Title: Karriere\n   Link: https://acme.de/karriere"));
        assert!(text.contains("Snippet: Offene Stellen"));
        assert!(text.contains("2. Title: Jobs"));
    }

    #[tokio::test]
    async fn test_without_client_is_not_configured() {
        let err = LlmRanker::new(None).rank("Acme", "Werkstudent", &[]).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }
}
