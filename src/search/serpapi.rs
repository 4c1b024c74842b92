//! SerpAPI Client
//!
//! Secondary search provider: Google organic results through SerpAPI. Each
//! result already carries the snippet Google shows, so no extraction step is
//! needed.

use crate::models::{SearchResult, SearchSource};
use crate::search::{SearchError, SnippetProvider};
use async_trait::async_trait;
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use tracing::{debug, info};

/// SerpAPI client for Google web search
pub struct SerpApiClient {
    api_key: String,
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Configure client from config
    pub fn from_config(config: &crate::config::SearchConfig) -> Self {
        Self::new(config.serpapi_key.clone())
    }

    /// Search Google and return the top organic results
    pub async fn search_google(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::NoApiKey("SerpAPI"));
        }

        info!(query = %query, "Searching Google via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("num".to_string(), max_results.to_string());

        let search = SerpApiSearch::google(params, self.api_key.clone());

        let results = search
            .json()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        debug!("Raw Google response received");

        let parsed = parse_organic_results(&results, max_results)?;
        info!(count = parsed.len(), "Google search completed");
        Ok(parsed)
    }
}

#[async_trait]
impl SnippetProvider for SerpApiClient {
    fn source(&self) -> SearchSource {
        SearchSource::SerpApi
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        self.search_google(query, max_results).await
    }
}

/// Convert SerpAPI's `organic_results` into evidence entries.
///
/// A response without organic results is an empty result set; an `error`
/// field is a failed request.
fn parse_organic_results(results: &Value, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    if let Some(error) = results.get("error").and_then(|v| v.as_str()) {
        // SerpAPI reports an empty result page through the error field too
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(SearchError::RequestFailed(error.to_string()));
    }

    let Some(organic_results) = results.get("organic_results") else {
        return Ok(Vec::new());
    };

    let results_array = organic_results
        .as_array()
        .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?;

    let mut parsed = Vec::new();
    for result in results_array.iter().take(max_results) {
        let link = result
            .get("link")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let mut entry = SearchResult::new(link, SearchSource::SerpApi);
        entry.title = result
            .get("title")
            .and_then(|v| v.as_str())
            .map(String::from);
        entry.snippet = result
            .get("snippet")
            .and_then(|v| v.as_str())
            .map(String::from);
        parsed.push(entry);
    }

    Ok(parsed)
}
