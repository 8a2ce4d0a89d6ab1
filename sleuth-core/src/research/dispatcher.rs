//! Search dispatcher: runs one round of queries concurrently.
//!
//! Every query gets its own retry loop and timeout. Workers write only into
//! their own slot of the returned [`RoundResult`]; merging into the evidence
//! store is left to the orchestrator once the whole round has finished.

use super::evidence::EvidenceItem;
use crate::config::{RetryConfig, SearchConfig};
use crate::error::SearchError;
use crate::retry::retry_counted;
use crate::search::SearchProvider;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A query that produced no results after all attempts. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub query: String,
    pub attempts: u32,
    pub error: String,
    /// Whether the last error was transient (the capability looked unreachable).
    pub transient: bool,
}

/// Outcome of one query inside a round.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: String,
    pub attempts: u32,
    pub result: Result<Vec<EvidenceItem>, SearchError>,
}

/// Round-local results, in the order the queries were given.
#[derive(Debug, Clone, Default)]
pub struct RoundResult {
    pub outcomes: Vec<QueryOutcome>,
}

impl RoundResult {
    /// All evidence items, in query order then provider order.
    pub fn items(&self) -> Vec<EvidenceItem> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> Vec<SearchFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Err(e) => Some(SearchFailure {
                    query: o.query.clone(),
                    attempts: o.attempts,
                    error: e.to_string(),
                    transient: e.is_transient(),
                }),
                Ok(_) => None,
            })
            .collect()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Every query failed with an exhausted transient error.
    pub fn all_unreachable(&self) -> bool {
        !self.outcomes.is_empty()
            && self
                .outcomes
                .iter()
                .all(|o| matches!(&o.result, Err(e) if e.is_transient()))
    }
}

pub struct SearchDispatcher {
    provider: Arc<dyn SearchProvider>,
    retry: RetryConfig,
    timeout: Duration,
    max_in_flight: Option<usize>,
    max_snippet_chars: usize,
}

impl SearchDispatcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        search: &SearchConfig,
        retry: RetryConfig,
        max_in_flight: Option<usize>,
        max_snippet_chars: usize,
    ) -> Self {
        Self {
            provider,
            retry,
            timeout: search.timeout(),
            max_in_flight,
            max_snippet_chars,
        }
    }

    /// Run all queries concurrently and wait for every one of them.
    pub async fn run(&self, queries: &[String]) -> RoundResult {
        let permits = self
            .max_in_flight
            .unwrap_or(queries.len())
            .max(1);
        let semaphore = Arc::new(Semaphore::new(permits));

        let tasks = queries.iter().map(|query| {
            let semaphore = semaphore.clone();
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire().await.ok();
                self.run_one(query).await
            }
        });

        RoundResult {
            outcomes: join_all(tasks).await,
        }
    }

    async fn run_one(&self, query: &str) -> QueryOutcome {
        let provider = self.provider.clone();
        let outcome = retry_counted(&self.retry, self.timeout, || {
            let provider = provider.clone();
            async move { provider.search(query).await }
        })
        .await;

        let result = match outcome.result {
            Ok(hits) => {
                debug!(
                    query,
                    hits = hits.len(),
                    attempts = outcome.attempts,
                    provider = self.provider.name(),
                    "Search completed"
                );
                Ok(hits
                    .iter()
                    .filter(|h| !h.url.trim().is_empty())
                    .map(|h| EvidenceItem::from_hit(h, self.max_snippet_chars))
                    .collect())
            }
            Err(e) => {
                warn!(query, attempts = outcome.attempts, error = %e, "Search failed");
                Err(e)
            }
        };

        QueryOutcome {
            query: query.to_string(),
            attempts: outcome.attempts,
            result,
        }
    }
}
