use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::CollaboratorError;

const CUSTOM_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Custom Search refuses more than 10 results per request.
const MAX_RESULTS: usize = 10;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// Web search backend used to find career-page candidates.
///
/// Carried in `AppState` as `Arc<dyn WebSearch>`.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError>;
}

#[derive(Debug, Clone)]
struct Credentials {
    api_key: String,
    engine_id: String,
}

/// Google Programmable Search (Custom Search JSON API), restricted to Germany.
pub struct GoogleSearch {
    client: Client,
    credentials: Option<Credentials>,
}

#[derive(Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

impl GoogleSearch {
    /// Missing credentials leave the backend disabled; every search then fails
    /// with `NotConfigured`.
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Result<Self, CollaboratorError> {
        let credentials = match (api_key, engine_id) {
            (Some(api_key), Some(engine_id)) => Some(Credentials { api_key, engine_id }),
            _ => None,
        };
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            credentials,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured("Google Custom Search"))?;
        let num = limit.clamp(1, MAX_RESULTS).to_string();

        info!(%query, "Searching the web for career pages");
        let response = self
            .client
            .get(CUSTOM_SEARCH_URL)
            .query(&[
                ("key", credentials.api_key.as_str()),
                ("cx", credentials.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
                ("cr", "countryDE"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api {
                service: "Google Custom Search",
                status: status.as_u16(),
                message,
            });
        }

        let body: CustomSearchResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;
        debug!("Custom Search returned {} items", body.items.len());
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_is_not_configured() {
        let search = GoogleSearch::new(Some("key".into()), None).unwrap();
        assert!(!search.is_configured());
        let err = search.search("acme careers", 5).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured(_)));
    }

    #[test]
    fn test_response_without_items_is_empty() {
        let body: CustomSearchResponse =
            serde_json::from_str(r#"{"kind": "customsearch#search"}"#).unwrap();
        assert!(body.items.is_empty());

        let body: CustomSearchResponse = serde_json::from_str(
            r#"{"items": [{"title": "Jobs", "link": "https://acme.de/jobs"}]}"#,
        )
        .unwrap();
        assert_eq!(body.items[0].snippet, "");
    }
}
