// Two-provider search aggregation

use crate::models::{SearchResult, SearchSource};
use crate::search::{ExtractOutcome, ExtractingProvider, SearchError, SnippetProvider};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct SearchAggregator {
    primary: Arc<dyn ExtractingProvider>,
    secondary: Arc<dyn SnippetProvider>,
    max_results: usize,
    timeout: Duration,
}

impl SearchAggregator {
    pub fn new(primary: Arc<dyn ExtractingProvider>, secondary: Arc<dyn SnippetProvider>) -> Self {
        Self {
            primary,
            secondary,
            max_results: 5,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set maximum results taken from each provider
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set the per-call provider timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search both providers for `topic` and merge the evidence.
    ///
    /// Output order: surviving primary entries, then every secondary entry.
    /// URLs returned by both providers are kept twice, each with its own text.
    pub async fn search(&self, topic: &str) -> Result<Vec<SearchResult>, SearchError> {
        info!(topic = %topic, "Aggregating search");

        let (primary, secondary) = tokio::join!(self.search_primary(topic), self.search_secondary(topic));

        let (primary, secondary) = match (primary, secondary) {
            (Err(p), Err(s)) => {
                error!(primary = %p, secondary = %s, "Both search providers failed");
                return Err(SearchError::AllProvidersFailed {
                    primary: p.to_string(),
                    secondary: s.to_string(),
                });
            }
            (p, s) => (
                p.unwrap_or_else(|e| {
                    warn!(provider = %self.primary.source(), error = %e, "Primary search failed");
                    Vec::new()
                }),
                s.unwrap_or_else(|e| {
                    warn!(provider = %self.secondary.source(), error = %e, "Secondary search failed");
                    Vec::new()
                }),
            ),
        };

        info!(primary = primary.len(), secondary = secondary.len(), "Search aggregation complete");
        let mut results = primary;
        results.extend(secondary);
        Ok(results)
    }

    async fn search_primary(&self, topic: &str) -> Result<Vec<SearchResult>, SearchError> {
        let source = self.primary.source();
        let mut hits = self
            .bounded(source, self.primary.search(topic, self.max_results))
            .await?;
        hits.truncate(self.max_results);

        let urls: Vec<String> = hits
            .iter()
            .filter(|h| !h.url.is_empty())
            .map(|h| h.url.clone())
            .collect();
        if urls.is_empty() {
            debug!(provider = %source, "No URLs to extract");
            return Ok(hits);
        }

        let outcome = match self.bounded(source, self.primary.extract(&urls)).await {
            Ok(outcome) => {
                debug!(
                    provider = %source,
                    extracted = outcome.succeeded.len(),
                    failed = outcome.failed.len(),
                    "Extraction complete"
                );
                Some(outcome)
            }
            Err(e) => {
                warn!(provider = %source, error = %e, "Extraction failed, keeping bare results");
                None
            }
        };

        Ok(merge_extraction(hits, outcome.as_ref()))
    }

    async fn search_secondary(&self, topic: &str) -> Result<Vec<SearchResult>, SearchError> {
        let source = self.secondary.source();
        let mut hits = self
            .bounded(source, self.secondary.search(topic, self.max_results))
            .await?;
        hits.truncate(self.max_results);
        Ok(hits)
    }

    async fn bounded<T, F>(&self, provider: SearchSource, call: F) -> Result<T, SearchError>
    where
        F: Future<Output = Result<T, SearchError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| SearchError::Timeout {
                provider,
                secs: self.timeout.as_secs(),
            })?
    }
}

/// Attach extracted content by exact URL and drop entries whose extraction failed.
pub fn merge_extraction(results: Vec<SearchResult>, outcome: Option<&ExtractOutcome>) -> Vec<SearchResult> {
    let Some(outcome) = outcome else {
        return results;
    };

    let content: HashMap<&str, &str> = outcome
        .succeeded
        .iter()
        .map(|page| (page.url.as_str(), page.content.as_str()))
        .collect();
    let failed: HashSet<&str> = outcome.failed.iter().map(String::as_str).collect();

    results
        .into_iter()
        .filter(|r| !failed.contains(r.url.as_str()))
        .map(|mut r| {
            if let Some(text) = content.get(r.url.as_str()) {
                r.content = Some(text.to_string());
            }
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ExtractedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePrimary {
        hits: Result<Vec<&'static str>, ()>,
        extract: Result<ExtractOutcome, ()>,
        extract_calls: AtomicUsize,
    }

    impl FakePrimary {
        fn new(hits: Vec<&'static str>, extract: ExtractOutcome) -> Self {
            Self {
                hits: Ok(hits),
                extract: Ok(extract),
                extract_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                hits: Err(()),
                extract: Err(()),
                extract_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExtractingProvider for FakePrimary {
        fn source(&self) -> SearchSource {
            SearchSource::Tavily
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
            match &self.hits {
                Ok(urls) => Ok(urls
                    .iter()
                    .map(|u| SearchResult::new(*u, SearchSource::Tavily).with_title(format!("T {}", u)))
                    .collect()),
                Err(()) => Err(SearchError::RequestFailed("tavily down".to_string())),
            }
        }

        async fn extract(&self, _urls: &[String]) -> Result<ExtractOutcome, SearchError> {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            self.extract
                .clone()
                .map_err(|_| SearchError::RequestFailed("extract down".to_string()))
        }
    }

    struct FakeSecondary {
        hits: Result<Vec<SearchResult>, ()>,
    }

    #[async_trait]
    impl SnippetProvider for FakeSecondary {
        fn source(&self) -> SearchSource {
            SearchSource::SerpApi
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
            self.hits
                .clone()
                .map_err(|_| SearchError::RequestFailed("serpapi down".to_string()))
        }
    }

    fn serp(urls: &[&str]) -> FakeSecondary {
        FakeSecondary {
            hits: Ok(urls
                .iter()
                .map(|u| {
                    SearchResult::new(*u, SearchSource::SerpApi)
                        .with_title("S")
                        .with_snippet(format!("snippet for {}", u))
                })
                .collect()),
        }
    }

    fn page(url: &str) -> ExtractedPage {
        ExtractedPage {
            url: url.to_string(),
            content: format!("content of {}", url),
        }
    }

    fn aggregator(primary: FakePrimary, secondary: FakeSecondary) -> SearchAggregator {
        SearchAggregator::new(Arc::new(primary), Arc::new(secondary))
    }

    #[tokio::test]
    async fn test_failed_extractions_are_removed_and_secondary_appended() {
        let primary = FakePrimary::new(
            vec!["https://a", "https://b", "https://c"],
            ExtractOutcome {
                succeeded: vec![page("https://a"), page("https://c")],
                failed: vec!["https://b".to_string()],
            },
        );
        let secondary = serp(&["https://b", "https://d"]);
        let expected_secondary = secondary.hits.clone().unwrap();

        let results = aggregator(primary, secondary).search("topic").await.unwrap();

        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://c", "https://b", "https://d"]);
        assert_eq!(results[0].content.as_deref(), Some("content of https://a"));
        assert!(results[..2].iter().all(|r| r.source == SearchSource::Tavily));
        // secondary entries untouched, even when their URL failed extraction upstream
        assert_eq!(&results[2..], expected_secondary.as_slice());
    }

    #[tokio::test]
    async fn test_both_empty_is_ok_and_skips_extraction() {
        let primary = Arc::new(FakePrimary::new(vec![], ExtractOutcome::default()));
        let agg = SearchAggregator::new(primary.clone(), Arc::new(serp(&[])));
        let results = agg.search("nothing").await.unwrap();
        assert!(results.is_empty());
        assert_eq!(primary.extract_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_yields_secondary_only() {
        let secondary = serp(&["https://x", "https://y"]);
        let expected = secondary.hits.clone().unwrap();
        let results = aggregator(FakePrimary::failing(), secondary)
            .search("topic")
            .await
            .unwrap();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn test_secondary_failure_yields_primary_only() {
        let primary = FakePrimary::new(
            vec!["https://a"],
            ExtractOutcome {
                succeeded: vec![page("https://a")],
                failed: vec![],
            },
        );
        let results = aggregator(primary, FakeSecondary { hits: Err(()) })
            .search("topic")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://a");
        assert!(results[0].content.is_some());
    }

    #[tokio::test]
    async fn test_both_failing_is_fatal() {
        let err = aggregator(FakePrimary::failing(), FakeSecondary { hits: Err(()) })
            .search("topic")
            .await
            .unwrap_err();
        match err {
            SearchError::AllProvidersFailed { primary, secondary } => {
                assert!(primary.contains("tavily down"));
                assert!(secondary.contains("serpapi down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_bare_primary_results() {
        let primary = FakePrimary {
            hits: Ok(vec!["https://a", "https://b"]),
            extract: Err(()),
            extract_calls: AtomicUsize::new(0),
        };
        let results = aggregator(primary, serp(&[])).search("topic").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.content.is_none()));
    }

    #[tokio::test]
    async fn test_results_are_capped_per_provider() {
        let primary = FakePrimary::new(
            vec!["https://1", "https://2", "https://3"],
            ExtractOutcome::default(),
        );
        let agg = aggregator(primary, serp(&["https://4", "https://5", "https://6"])).with_max_results(2);
        let urls: Vec<String> = agg
            .search("topic")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://1", "https://2", "https://4", "https://5"]);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_and_degrades() {
        struct SlowSecondary;

        #[async_trait]
        impl SnippetProvider for SlowSecondary {
            fn source(&self) -> SearchSource {
                SearchSource::SerpApi
            }

            async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, SearchError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![])
            }
        }

        let primary = FakePrimary::new(vec!["https://a"], ExtractOutcome::default());
        let agg = SearchAggregator::new(Arc::new(primary), Arc::new(SlowSecondary))
            .with_timeout(Duration::from_millis(20));
        let results = agg.search("topic").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_merge_without_outcome_is_identity() {
        let input = vec![SearchResult::new("https://a", SearchSource::Tavily)];
        assert_eq!(merge_extraction(input.clone(), None), input);
    }
}
