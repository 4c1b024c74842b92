//! Search Module
//!
//! Collects web evidence for the pipeline's search stage from two providers:
//! - Tavily (primary) - search, then full-page extraction of every hit
//! - SerpAPI Google (secondary) - organic results with provider snippets
//!
//! [`SearchAggregator`] runs both concurrently and merges them into one
//! evidence list. A single failing provider degrades the result; only a
//! failure of both is an error.

pub mod aggregator;
#[cfg(test)]
pub mod mock;
pub mod serpapi;
pub mod tavily;

pub use aggregator::{merge_extraction, SearchAggregator};
pub use serpapi::SerpApiClient;
pub use tavily::TavilyClient;

use crate::models::{SearchResult, SearchSource};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} API key not configured")]
    NoApiKey(&'static str),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("{provider} did not answer within {secs}s")]
    Timeout { provider: SearchSource, secs: u64 },

    #[error("All search providers failed (primary: {primary}; secondary: {secondary})")]
    AllProvidersFailed { primary: String, secondary: String },
}

/// Page text returned by an extraction call
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub content: String,
}

/// Outcome of extracting a batch of URLs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOutcome {
    pub succeeded: Vec<ExtractedPage>,
    /// URLs the provider could not fetch
    pub failed: Vec<String>,
}

/// Provider that returns bare hits and can extract their page content.
#[async_trait]
pub trait ExtractingProvider: Send + Sync {
    fn source(&self) -> SearchSource;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;

    async fn extract(&self, urls: &[String]) -> Result<ExtractOutcome, SearchError>;
}

/// Provider whose hits already carry a snippet.
#[async_trait]
pub trait SnippetProvider: Send + Sync {
    fn source(&self) -> SearchSource;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}
