//! Language model provider implementations.
//!
//! Provides concrete implementations of the `LlmProvider` trait for:
//! - OpenAI-compatible APIs (OpenAI, Azure, Ollama, vLLM, LM Studio)
//! - Google Gemini API (Gemini models)
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod gemini;
pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::LlmError;
use std::sync::Arc;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// Build the provider selected by `config.provider`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.provider {
        LlmProviderKind::OpenAi => Ok(Arc::new(OpenAiCompatibleProvider::new(config)?)),
        LlmProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(config)?)),
    }
}

/// Resolve the API key: inline config first, then the configured environment variable.
pub(crate) fn resolve_api_key(config: &LlmConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(&config.api_key_env).ok())
        .filter(|k| !k.is_empty())
}

/// Map an HTTP status to the error taxonomy shared by all providers.
pub(crate) fn map_http_error(provider: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => {
            tracing::debug!(body = %body, provider, "Authentication failed");
            LlmError::AuthFailed {
                provider: provider.to_string(),
            }
        }
        429 => LlmError::RateLimited {
            retry_after_secs: parse_retry_after(body).unwrap_or(5),
        },
        code if code >= 500 => LlmError::ServerError {
            status: code,
            message: truncate(body, 300),
        },
        code => LlmError::ApiRequest {
            message: format!("HTTP {}: {}", code, truncate(body, 300)),
        },
    }
}

/// Extract "try again in Xs" from a provider error message.
fn parse_retry_after(body: &str) -> Option<u64> {
    let msg = serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()?
        .to_string();
    msg.split("in ")
        .last()
        .and_then(|s| s.trim().trim_end_matches('.').trim_end_matches('s').parse::<u64>().ok())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Map a transport-level reqwest failure.
///
/// The request URL is stripped from the message; it can carry credentials.
pub(crate) fn map_transport_error(provider: &str, err: reqwest::Error) -> LlmError {
    let err = err.without_url();
    if err.is_timeout() {
        LlmError::Timeout { timeout_secs: 0 }
    } else if err.is_connect() || err.is_request() {
        LlmError::Connection {
            message: format!("{provider}: {err}"),
        }
    } else {
        LlmError::ApiRequest {
            message: format!("{provider}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_map_http_error_classes() {
        assert!(matches!(
            map_http_error("p", StatusCode::UNAUTHORIZED, ""),
            LlmError::AuthFailed { .. }
        ));
        assert!(map_http_error("p", StatusCode::SERVICE_UNAVAILABLE, "busy").is_transient());
        assert!(!map_http_error("p", StatusCode::BAD_REQUEST, "bad").is_transient());
    }

    #[test]
    fn test_rate_limit_retry_after_parsed() {
        let body = r#"{"error": {"message": "Rate limit reached. Please try again in 7s"}}"#;
        match map_http_error("p", StatusCode::TOO_MANY_REQUESTS, body) {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 7),
            e => panic!("Expected RateLimited, got: {e:?}"),
        }
    }

    #[test]
    fn test_rate_limit_defaults_when_unparseable() {
        match map_http_error("p", StatusCode::TOO_MANY_REQUESTS, "slow down") {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 5),
            e => panic!("Expected RateLimited, got: {e:?}"),
        }
    }

    #[test]
    fn test_resolve_api_key_prefers_inline() {
        let config = LlmConfig {
            api_key: Some("inline".into()),
            api_key_env: "SLEUTH_TEST_UNSET_KEY_VAR".into(),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&config).as_deref(), Some("inline"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
