//! Claude client shared by every LLM-backed collaborator.
//!
//! Role suggestion, career-page ranking and placeholder text are short,
//! single-turn prompts. Each caller picks a token budget; transport errors,
//! 429 and 5xx answers are retried with exponential backoff (honouring
//! `retry-after` when the API sends one).

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Output budget for answers that are a list or a small JSON object.
pub const SHORT_ANSWER_TOKENS: u32 = 512;
/// Output budget for generated prose such as placeholder documents.
pub const DOCUMENT_TOKENS: u32 = 1500;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Answer is not the expected JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("LLM returned no text")]
    EmptyContent,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// All text blocks joined, trimmed.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string()
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
        })
    }

    /// Plain-text answer within `SHORT_ANSWER_TOKENS`.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.complete(prompt, system, SHORT_ANSWER_TOKENS).await
    }

    /// Plain-text answer with a caller-chosen output budget.
    pub async fn call_text_with_budget(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        self.complete(prompt, system, max_tokens).await
    }

    /// Answer parsed as JSON. Tolerates code fences and chatter around the
    /// first JSON object or array.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.complete(prompt, system, SHORT_ANSWER_TOKENS).await?;
        Ok(serde_json::from_str(extract_json(&text))?)
    }

    async fn complete(&self, prompt: &str, system: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens,
            system,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut attempt = 1;
        loop {
            let failure = match self.send(&request).await {
                Ok(response) => return response_text(response),
                Err(failure) => failure,
            };
            match failure {
                Failure::Fatal(e) => return Err(e),
                Failure::Retry { error, wait } if attempt < MAX_ATTEMPTS => {
                    let wait = wait.unwrap_or_else(|| backoff(attempt));
                    warn!("LLM call attempt {attempt} failed ({error}), retrying in {wait:?}");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Failure::Retry { error, .. } => {
                    return Err(LlmError::Exhausted {
                        attempts: attempt,
                        last: error.to_string(),
                    });
                }
            }
        }
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, Failure> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| Failure::Retry {
                error: LlmError::Http(e),
                wait: None,
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| Failure::Fatal(LlmError::Http(e)));
        }

        let wait = retry_after(&response);
        let body = response.text().await.unwrap_or_default();
        let error = LlmError::Api {
            status: status.as_u16(),
            message: api_message(&body),
        };
        if is_retryable(status) {
            Err(Failure::Retry { error, wait })
        } else {
            Err(Failure::Fatal(error))
        }
    }
}

enum Failure {
    Retry {
        error: LlmError,
        wait: Option<Duration>,
    },
    Fatal(LlmError),
}

fn response_text(response: MessagesResponse) -> Result<String, LlmError> {
    if let Some(usage) = &response.usage {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "LLM call succeeded"
        );
    }
    let text = response.text();
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(text)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 1 s, 2 s, 4 s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn api_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// The JSON value inside an answer: the span from the first `{` or `[` to
/// the last matching closer, or the trimmed text when there is none.
fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let Some(start) = text.find(['{', '[']) else {
        return text;
    };
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    match text.rfind(closer) {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_answer() {
        let input = "```json\n{\"url\": null, \"confidence\": 0.1}\n```";
        assert_eq!(extract_json(input), "{\"url\": null, \"confidence\": 0.1}");
    }

    #[test]
    fn test_extract_json_ignores_chatter() {
        let input = "Here is the result:\n[\"Werkstudent BI\"]\nGood luck!";
        assert_eq!(extract_json(input), "[\"Werkstudent BI\"]");
    }

    #[test]
    fn test_extract_json_passes_plain_text_through() {
        assert_eq!(extract_json("  no json here "), "no json here");
    }

    #[test]
    fn test_text_joins_text_blocks_only() {
        let json = r#"{
            "content": [
                {"type": "tool_use"},
                {"type": "text", "text": "Werkstudent "},
                {"type": "text", "text": "Data Analyst\n"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response_text(response).unwrap(), "Werkstudent Data Analyst");
    }

    #[test]
    fn test_blank_answer_is_empty_content() {
        let response: MessagesResponse =
            serde_json::from_str(r#"{"content": [{"type": "text", "text": "  "}]}"#).unwrap();
        assert!(matches!(response_text(response), Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_retry_classification_and_backoff() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::from_u16(529).unwrap()));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_api_message_prefers_error_envelope() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(api_message(body), "Overloaded");
        assert_eq!(api_message("bad gateway"), "bad gateway");
    }
}
