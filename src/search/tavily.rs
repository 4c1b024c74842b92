//! Tavily Client
//!
//! Primary search provider. A search returns URLs and titles only; page text
//! comes from a separate `/extract` call that also reports the URLs it could
//! not fetch.

use crate::models::{SearchResult, SearchSource};
use crate::search::{ExtractOutcome, ExtractedPage, ExtractingProvider, SearchError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct TavilyExtractResponse {
    #[serde(default)]
    results: Vec<TavilyExtracted>,
    #[serde(default)]
    failed_results: Vec<TavilyFailed>,
}

#[derive(Debug, Deserialize)]
struct TavilyExtracted {
    url: String,
    #[serde(default)]
    raw_content: String,
}

#[derive(Debug, Deserialize)]
struct TavilyFailed {
    url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_api_base(api_key, TAVILY_API_BASE)
    }

    pub fn with_api_base(api_key: impl Into<String>, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &crate::config::SearchConfig) -> Self {
        let mut client = Self::new(config.tavily_api_key.clone());
        // Extraction of slow pages can take a while; keep the HTTP layer bounded too.
        if let Ok(http) = reqwest::Client::builder()
            .timeout(config.timeout() + Duration::from_secs(5))
            .build()
        {
            client.http = http;
        }
        client
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NoApiKey("Tavily"));
        }

        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(format!("tavily: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!("tavily status {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(format!("tavily: {}", e)))
    }
}

#[async_trait]
impl ExtractingProvider for TavilyClient {
    fn source(&self) -> SearchSource {
        SearchSource::Tavily
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching via Tavily");
        let response: TavilySearchResponse = self
            .post(
                "/search",
                serde_json::json!({
                    "query": query,
                    "topic": "general",
                    "search_depth": "advanced",
                    "max_results": max_results,
                }),
            )
            .await?;

        let results: Vec<SearchResult> = response
            .results
            .into_iter()
            .take(max_results)
            .map(|hit| {
                let result = SearchResult::new(hit.url.trim(), SearchSource::Tavily);
                if hit.title.is_empty() {
                    result
                } else {
                    result.with_title(hit.title)
                }
            })
            .collect();

        info!(count = results.len(), "Tavily search completed");
        Ok(results)
    }

    async fn extract(&self, urls: &[String]) -> Result<ExtractOutcome, SearchError> {
        debug!(count = urls.len(), "Extracting pages via Tavily");
        let response: TavilyExtractResponse = self
            .post("/extract", serde_json::json!({ "urls": urls }))
            .await?;

        Ok(ExtractOutcome {
            succeeded: response
                .results
                .into_iter()
                .map(|r| ExtractedPage {
                    url: r.url,
                    content: r.raw_content,
                })
                .collect(),
            failed: response.failed_results.into_iter().map(|f| f.url).collect(),
        })
    }
}
