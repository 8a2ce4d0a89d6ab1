//! SearxNG JSON API backend (`{base_url}/search?q=..&format=json`).

use super::{SearchHit, SearchProvider, build_http_client, map_http_status, map_transport_error};
use crate::config::SearchConfig;
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub struct SearxngProvider {
    client: Client,
    base_url: String,
    max_results: usize,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl SearxngProvider {
    pub fn new(config: &SearchConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::Invalid {
                message: "search.base_url is required for the searxng provider".into(),
            })?;
        url::Url::parse(base_url).map_err(|e| ConfigError::Invalid {
            message: format!("search.base_url is not a valid URL: {e}"),
        })?;

        Ok(Self {
            client: build_http_client(config)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            timeout_secs: config.timeout_secs,
        })
    }
}

fn into_hits(response: SearxngResponse, max_results: usize) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .take(max_results)
        .map(|r| SearchHit {
            url: r.url,
            title: r.title,
            snippet: r.content,
        })
        .collect()
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query, base_url = %self.base_url, "SearxNG search");
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(map_http_status(response.status()));
        }

        let parsed: SearxngResponse =
            response.json().await.map_err(|e| SearchError::Permanent {
                message: format!("Failed to parse SearxNG response: {}", e),
            })?;
        Ok(into_hits(parsed, self.max_results))
    }

    fn name(&self) -> &str {
        "searxng"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchProviderKind;

    #[test]
    fn test_into_hits() {
        let response: SearxngResponse = serde_json::from_str(
            r#"{"query": "tokio", "results": [
                {"url": "https://tokio.rs/", "title": "Tokio", "content": "An async runtime"},
                {"url": "", "title": "broken"},
                {"url": "https://docs.rs/tokio", "title": "docs.rs"}
            ]}"#,
        )
        .unwrap();
        let hits = into_hits(response, 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "An async runtime");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let config = SearchConfig {
            provider: SearchProviderKind::Searxng,
            base_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(SearxngProvider::new(&config).is_err());
    }
}
