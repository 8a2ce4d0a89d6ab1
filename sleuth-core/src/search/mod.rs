//! Web search capability.
//!
//! The research core only sees the [`SearchProvider`] trait. Concrete
//! backends live in submodules and are selected from [`SearchConfig`]
//! with [`create_search_provider`].

pub mod duckduckgo;
pub mod searxng;

use crate::config::{SearchConfig, SearchProviderKind};
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub use duckduckgo::DuckDuckGoProvider;
pub use searxng::SearxngProvider;

/// One raw search result as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// A stateless, re-entrant search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    /// Short provider name used in logs.
    fn name(&self) -> &str;
}

/// Build the search backend selected by `config.provider`.
pub fn create_search_provider(
    config: &SearchConfig,
) -> Result<Arc<dyn SearchProvider>, ConfigError> {
    match config.provider {
        SearchProviderKind::DuckDuckGo => Ok(Arc::new(DuckDuckGoProvider::new(config)?)),
        SearchProviderKind::Searxng => Ok(Arc::new(SearxngProvider::new(config)?)),
    }
}

pub(crate) fn build_http_client(config: &SearchConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(concat!("Sleuth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Classify a non-success HTTP status from a search backend.
pub(crate) fn map_http_status(status: reqwest::StatusCode) -> SearchError {
    match status.as_u16() {
        429 => SearchError::RateLimited,
        408 => SearchError::Transient {
            message: "request timeout".into(),
        },
        code if code >= 500 => SearchError::Transient {
            message: format!("HTTP {code}"),
        },
        code => SearchError::Permanent {
            message: format!("HTTP {code}"),
        },
    }
}

pub(crate) fn map_transport_error(err: reqwest::Error, timeout_secs: u64) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout { timeout_secs }
    } else if err.is_builder() {
        SearchError::Permanent {
            message: err.to_string(),
        }
    } else {
        SearchError::Transient {
            message: err.to_string(),
        }
    }
}

/// Scripted outcome for one call to [`MockSearchProvider`].
#[derive(Debug, Clone)]
pub enum MockSearchReply {
    Hits(Vec<SearchHit>),
    Error(SearchError),
}

/// A scripted search provider for tests and offline runs.
///
/// Unscripted queries fall back to the default reply, which is one
/// synthetic hit per query unless changed. Scripts are consumed per query;
/// the last scripted reply of a query repeats.
pub struct MockSearchProvider {
    scripts: Mutex<HashMap<String, VecDeque<MockSearchReply>>>,
    default_reply: Mutex<Option<MockSearchReply>>,
    calls: Mutex<Vec<String>>,
    cancel_hooks: Mutex<Vec<(String, CancellationToken)>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_reply: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            cancel_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Queue hits for an exact query string.
    pub fn script_hits(&self, query: impl Into<String>, hits: Vec<SearchHit>) {
        self.script(query, MockSearchReply::Hits(hits));
    }

    /// Queue an error for an exact query string.
    pub fn script_error(&self, query: impl Into<String>, error: SearchError) {
        self.script(query, MockSearchReply::Error(error));
    }

    fn script(&self, query: impl Into<String>, reply: MockSearchReply) {
        self.scripts
            .lock()
            .unwrap()
            .entry(query.into())
            .or_default()
            .push_back(reply);
    }

    /// Reply used for every query without a script.
    pub fn set_default(&self, reply: MockSearchReply) {
        *self.default_reply.lock().unwrap() = Some(reply);
    }

    /// Cancel `token` as soon as `query` is searched.
    pub fn cancel_on_query(&self, query: impl Into<String>, token: CancellationToken) {
        self.cancel_hooks
            .lock()
            .unwrap()
            .push((query.into(), token));
    }

    /// Number of calls (including retries) made for a query.
    pub fn call_count(&self, query: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.as_str() == query)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every query received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, query: &str) -> MockSearchReply {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(query) {
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(reply) = reply {
                return reply;
            }
        }
        drop(scripts);

        self.default_reply.lock().unwrap().clone().unwrap_or_else(|| {
            MockSearchReply::Hits(vec![SearchHit::new(
                format!(
                    "https://example.com/search/{}",
                    urlencoding::encode(query)
                ),
                format!("Result for {query}"),
                format!("Mock evidence about {query}."),
            )])
        })
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());

        let hooks: Vec<CancellationToken> = self
            .cancel_hooks
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| q == query)
            .map(|(_, t)| t.clone())
            .collect();
        if !hooks.is_empty() {
            for token in hooks {
                token.cancel();
            }
            // Stay pending long enough for the orchestrator to observe the cancel.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        match self.next_reply(query) {
            MockSearchReply::Hits(hits) => Ok(hits),
            MockSearchReply::Error(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
