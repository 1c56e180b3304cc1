use async_trait::async_trait;
use tracing::{info, warn};

use super::prompts::SUGGEST_TITLES_PROMPT_TEMPLATE;
use crate::discovery::FilterRule;
use crate::errors::CollaboratorError;
use crate::llm_client::{prompts::PLAIN_TEXT_SYSTEM, LlmClient};

/// Roles searched when no suggestion is available.
pub const DEFAULT_TITLES: &[&str] = &[
    "Werkstudent Softwareentwicklung",
    "Werkstudent Data Analysis",
    "Werkstudent Webentwicklung",
];

/// Suggests role titles to search for, best first.
///
/// Carried in `AppState` as `Arc<dyn TitleSuggester>`.
#[async_trait]
pub trait TitleSuggester: Send + Sync {
    async fn suggest(&self, cv_text: &str, max_titles: usize)
        -> Result<Vec<String>, CollaboratorError>;
}

/// Claude-backed suggester. Answers are scoped to the include terms of the
/// filter rule, so a suggestion the filter would drop is never searched.
pub struct LlmTitleSuggester {
    llm: Option<LlmClient>,
    rule: FilterRule,
}

impl LlmTitleSuggester {
    pub fn new(llm: Option<LlmClient>, rule: FilterRule) -> Self {
        Self { llm, rule }
    }
}

#[async_trait]
impl TitleSuggester for LlmTitleSuggester {
    async fn suggest(
        &self,
        cv_text: &str,
        max_titles: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        let llm = self
            .llm
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("LLM role suggestion"))?;

        let prompt = SUGGEST_TITLES_PROMPT_TEMPLATE
            .replace("{count}", &max_titles.to_string())
            .replace("{resume}", cv_text);
        let answer = llm.call_text(&prompt, PLAIN_TEXT_SYSTEM).await?;

        let titles = parse_titles(&answer, &self.rule, max_titles);
        if titles.is_empty() {
            return Err(CollaboratorError::Malformed(format!(
                "no usable role in answer: {answer}"
            )));
        }
        Ok(titles)
    }
}

/// Titles from a comma- or line-separated answer, with list bullets removed,
/// keeping only those that mention an include term.
fn parse_titles(answer: &str, rule: &FilterRule, max_titles: usize) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();
    for part in answer.split([',', '\n']) {
        let title = part
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '•' | '.'))
            .trim();
        if title.is_empty()
            || !rule.mentions_include_term(title)
            || titles.iter().any(|t| t.eq_ignore_ascii_case(title))
        {
            continue;
        }
        titles.push(title.to_string());
        if titles.len() == max_titles {
            break;
        }
    }
    titles
}

/// Suggested titles, or `DEFAULT_TITLES` when the collaborator fails.
pub async fn suggest_or_default(
    suggester: &dyn TitleSuggester,
    cv_text: &str,
    max_titles: usize,
) -> Vec<String> {
    match suggester.suggest(cv_text, max_titles).await {
        Ok(titles) => {
            info!("Suggested roles: {titles:?}");
            titles
        }
        Err(e) => {
            warn!("Role suggestion failed, using default roles: {e}");
            DEFAULT_TITLES
                .iter()
                .take(max_titles.max(1))
                .map(|t| t.to_string())
                .collect()
        }
    }
}
