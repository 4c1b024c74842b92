//! Search Stage
//!
//! Turns the plan stage's output into web evidence: the planned queries run
//! through the [`SearchAggregator`] concurrently and the merged results are
//! rendered as a numbered EVIDENCE list for the digest prompt.

use crate::models::SearchResult;
use crate::search::SearchAggregator;
use crate::types::{AppError, AppResult};
use crate::utils::{extract_json_block, truncate_chars};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{info, warn};

/// Upper bound on planned queries that are actually searched
pub const MAX_PLANNED_SEARCHES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchItem {
    #[serde(default)]
    pub reason: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebSearchPlan {
    #[serde(default)]
    pub searches: Vec<WebSearchItem>,
}

impl WebSearchPlan {
    /// Read the plan stage's reply. Fenced JSON is accepted; anything that is
    /// not a usable plan becomes a single search for its first non-empty line.
    pub fn parse(text: &str) -> Self {
        let parsed = serde_json::from_str::<WebSearchPlan>(extract_json_block(text))
            .map(|plan| WebSearchPlan {
                searches: plan
                    .searches
                    .into_iter()
                    .filter(|item| !item.query.trim().is_empty())
                    .collect(),
            });

        match parsed {
            Ok(plan) if !plan.searches.is_empty() => plan,
            _ => {
                warn!("Search plan is not valid JSON, falling back to first line");
                let searches = text
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(|line| WebSearchItem {
                        reason: String::new(),
                        query: line.to_string(),
                    })
                    .into_iter()
                    .collect();
                WebSearchPlan { searches }
            }
        }
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.searches.iter().map(|item| item.query.trim())
    }
}

/// Evidence gathered for one planned query
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceGroup {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Run up to [`MAX_PLANNED_SEARCHES`] planned queries concurrently.
///
/// A query whose search fails is skipped. If every query fails the last
/// search error is returned; if none produced any result the run has no
/// evidence to work from.
pub async fn gather_evidence(aggregator: &SearchAggregator, plan: &WebSearchPlan) -> AppResult<Vec<EvidenceGroup>> {
    let queries: Vec<&str> = plan.queries().take(MAX_PLANNED_SEARCHES).collect();
    info!(queries = queries.len(), "Gathering evidence");

    let outcomes = join_all(queries.iter().map(|query| aggregator.search(query))).await;

    let mut groups = Vec::new();
    let mut last_error = None;
    for (query, outcome) in queries.iter().zip(outcomes) {
        match outcome {
            Ok(results) => groups.push(EvidenceGroup {
                query: query.to_string(),
                results,
            }),
            Err(e) => {
                warn!(query = %query, error = %e, "Planned search failed");
                last_error = Some(e);
            }
        }
    }

    if groups.is_empty() {
        if let Some(e) = last_error {
            return Err(AppError::Search(e));
        }
    }
    let total: usize = groups.iter().map(|g| g.results.len()).sum();
    if total == 0 {
        return Err(AppError::EmptyEvidence);
    }

    info!(groups = groups.len(), results = total, "Evidence gathered");
    Ok(groups)
}

/// Build the digest prompt: the plan followed by a numbered EVIDENCE list.
pub fn render_evidence_prompt(plan_text: &str, groups: &[EvidenceGroup], content_chars: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SEARCH PLAN:\n{}\n", plan_text.trim());
    out.push_str("EVIDENCE:\n");

    let mut n = 0;
    for group in groups {
        let _ = writeln!(out, "\n## Query: {}", group.query);
        for result in &group.results {
            n += 1;
            let _ = writeln!(out, "[{}] url: {}", n, result.url);
            if let Some(title) = &result.title {
                let _ = writeln!(out, "    title: {}", title);
            }
            if let Some(snippet) = &result.snippet {
                let _ = writeln!(out, "    snippet: {}", snippet);
            }
            if let Some(content) = &result.content {
                let _ = writeln!(out, "    content: {}", truncate_chars(content.trim(), content_chars));
            }
        }
    }
    out
}
