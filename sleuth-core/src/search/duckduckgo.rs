//! DuckDuckGo instant answer backend.
//!
//! No API key required. Results come from the abstract, related topics
//! (including grouped topics), and the `Results` array.

use super::{SearchHit, SearchProvider, build_http_client, map_http_status, map_transport_error};
use crate::config::SearchConfig;
use crate::error::{ConfigError, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com";

pub struct DuckDuckGoProvider {
    client: Client,
    base_url: String,
    max_results: usize,
    timeout_secs: u64,
}

impl DuckDuckGoProvider {
    pub fn new(config: &SearchConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_results: config.max_results,
            timeout_secs: config.timeout_secs,
        })
    }

    fn query_url(&self, query: &str) -> String {
        format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        )
    }
}

/// Extract hits from an instant answer payload, keeping at most `max_results`.
pub(crate) fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    let abstract_text = body
        .get("AbstractText")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let abstract_url = body
        .get("AbstractURL")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let title = body
            .get("Heading")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .or_else(|| body.get("AbstractSource").and_then(|v| v.as_str()))
            .unwrap_or("Unknown");
        hits.push(SearchHit::new(abstract_url, title, abstract_text));
    }

    if let Some(results) = body.get("Results").and_then(|v| v.as_array()) {
        collect_topics(results, &mut hits);
    }
    if let Some(topics) = body.get("RelatedTopics").and_then(|v| v.as_array()) {
        collect_topics(topics, &mut hits);
    }

    hits.truncate(max_results);
    hits
}

fn collect_topics(topics: &[Value], hits: &mut Vec<SearchHit>) {
    for topic in topics {
        // Disambiguation groups nest their entries under "Topics".
        if let Some(nested) = topic.get("Topics").and_then(|v| v.as_array()) {
            collect_topics(nested, hits);
            continue;
        }
        let text = topic.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = topic.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(text);
        hits.push(SearchHit::new(url, title, text));
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query, "DuckDuckGo search");
        let response = self
            .client
            .get(self.query_url(query))
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(map_http_status(response.status()));
        }

        let body: Value = response.json().await.map_err(|e| SearchError::Permanent {
            message: format!("Failed to parse search response: {}", e),
        })?;

        Ok(parse_instant_answer(&body, self.max_results))
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_instant_answer() {
        let body = json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "AbstractSource": "Wikipedia",
            "Results": [],
            "RelatedTopics": [
                {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "See also", "Topics": [
                    {"Text": "Ferris - Mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
                ]},
                {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
            ]
        });
        let hits = parse_instant_answer(&body, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Rust (programming language)");
        assert_eq!(hits[1].title, "Cargo");
        assert_eq!(hits[2].url, "https://duckduckgo.com/Ferris");
    }

    #[test]
    fn test_parse_respects_max_results() {
        let topics: Vec<Value> = (0..8)
            .map(|i| json!({"Text": format!("T{i}"), "FirstURL": format!("https://d.com/{i}")}))
            .collect();
        let body = json!({ "RelatedTopics": topics });
        assert_eq!(parse_instant_answer(&body, 5).len(), 5);
    }

    #[test]
    fn test_parse_empty_payload() {
        assert!(parse_instant_answer(&json!({}), 5).is_empty());
    }

    #[test]
    fn test_query_url_encodes() {
        let provider = DuckDuckGoProvider::new(&SearchConfig::default()).unwrap();
        assert_eq!(
            provider.query_url("a b&c"),
            "https://api.duckduckgo.com/?q=a%20b%26c&format=json&no_html=1&skip_disambig=1"
        );
    }
}
