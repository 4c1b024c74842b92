// Deterministic search providers for tests

use crate::models::{SearchResult, SearchSource};
use crate::search::{ExtractOutcome, ExtractedPage, ExtractingProvider, SearchError, SnippetProvider};
use async_trait::async_trait;

/// One hit per query at `https://<query-with-dashes>.example`, always extractable.
pub struct StaticPrimary {
    pub up: bool,
}

#[async_trait]
impl ExtractingProvider for StaticPrimary {
    fn source(&self) -> SearchSource {
        SearchSource::Tavily
    }

    async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
        if !self.up {
            return Err(SearchError::RequestFailed("primary down".to_string()));
        }
        let slug = query.replace(' ', "-");
        Ok(vec![
            SearchResult::new(format!("https://{}.example", slug), SearchSource::Tavily).with_title(query)
        ])
    }

    async fn extract(&self, urls: &[String]) -> Result<ExtractOutcome, SearchError> {
        Ok(ExtractOutcome {
            succeeded: urls
                .iter()
                .map(|url| ExtractedPage {
                    url: url.clone(),
                    content: format!("page text of {}", url),
                })
                .collect(),
            failed: Vec::new(),
        })
    }
}

/// A single fixed hit with a snippet.
pub struct StaticSecondary {
    pub up: bool,
}

#[async_trait]
impl SnippetProvider for StaticSecondary {
    fn source(&self) -> SearchSource {
        SearchSource::SerpApi
    }

    async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
        if !self.up {
            return Err(SearchError::RequestFailed("secondary down".to_string()));
        }
        Ok(vec![SearchResult::new("https://serp.example", SearchSource::SerpApi).with_snippet("a snippet")])
    }
}
