//! Serper.dev web search backend for `SearchProvider`.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::capability::{SearchHit, SearchProvider};
use crate::error::PipelineError;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const DEFAULT_MAX_RESULTS: usize = 5;

/// Google search via the Serper API.
///
/// Issues a JSON POST with the `X-API-KEY` header and reads the `organic`
/// result array.
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_results: usize,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Build from the environment: loads `.env`, then reads `SERPER_API_KEY`.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenv::dotenv().ok();
        let api_key = std::env::var("SERPER_API_KEY")
            .map_err(|_| PipelineError::Search("SERPER_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Override the endpoint (test servers, regional proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Cap the number of results requested (builder).
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn parse_organic(payload: &serde_json::Value) -> Vec<SearchHit> {
        payload
            .get("organic")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let title = entry.get("title")?.as_str()?.to_string();
                        let url = entry.get("link")?.as_str()?.to_string();
                        let snippet = entry
                            .get("snippet")
                            .and_then(|s| s.as_str())
                            .unwrap_or_default()
                            .to_string();
                        Some(SearchHit {
                            title,
                            url,
                            snippet,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, PipelineError> {
        debug!(query = %query, max_results = self.max_results, "Serper search");
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.max_results }))
            .send()
            .await
            .map_err(|e| PipelineError::Search(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Search(format!(
                "search API returned {status}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Search(format!("bad payload: {e}")))?;
        let hits = Self::parse_organic(&payload);
        debug!(query = %query, hits = hits.len(), "Serper search complete");
        Ok(hits)
    }
}
