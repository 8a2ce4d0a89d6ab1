//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/sleuth/config.toml` and/or `.sleuth/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for Sleuth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub research: ResearchConfig,
}

impl SleuthConfig {
    /// Reject values that would make the research loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "llm.timeout_secs must be greater than zero".into(),
            });
        }
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "search.timeout_secs must be greater than zero".into(),
            });
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::Invalid {
                message: "search.max_results must be greater than zero".into(),
            });
        }
        if self.research.max_concurrent_searches == Some(0) {
            return Err(ConfigError::Invalid {
                message: "research.max_concurrent_searches must be greater than zero".into(),
            });
        }
        if self.research.max_snippet_chars == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_snippet_chars must be greater than zero".into(),
            });
        }
        if self.research.max_document_chars == 0 {
            return Err(ConfigError::Invalid {
                message: "research.max_document_chars must be greater than zero".into(),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                message: "retry.backoff_multiplier must be at least 1.0".into(),
            });
        }
        Ok(())
    }
}

/// Which language model backend to talk to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: String,
    /// Override for the API endpoint (Ollama, vLLM, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call timeout, applied to every attempt.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which search backend to query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchProviderKind {
    #[default]
    DuckDuckGo,
    Searxng,
}

/// Web search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub provider: SearchProviderKind,
    /// Endpoint for self-hosted providers (SearxNG).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum hits kept per query.
    pub max_results: usize,
    /// Per-call timeout, applied to every attempt.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::DuckDuckGo,
            base_url: None,
            max_results: 5,
            timeout_secs: 15,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry policy for transient capability failures.
///
/// Defaults give two extra attempts waiting 250ms then 1s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Add up to 25% random delay on top of the computed backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 1000,
            backoff_multiplier: 4.0,
            jitter: false,
        }
    }
}

/// Orchestrator policy knobs. The effort budget table is intentionally absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Cap on in-flight searches per round; `None` dispatches the whole round at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_searches: Option<usize>,
    /// Synthesize an answer from already-merged evidence when cancelled.
    pub finalize_on_cancel: bool,
    /// Snippets longer than this are cut before entering the evidence store.
    pub max_snippet_chars: usize,
    /// Uploaded document text is cut to this length before seeding.
    pub max_document_chars: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: None,
            finalize_on_cancel: false,
            max_snippet_chars: 1200,
            max_document_chars: 4000,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.sleuth/config.toml`)
/// 5. User config (`~/.config/sleuth/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "sleuth", "sleuth") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (SLEUTH_LLM__MODEL, SLEUTH_RESEARCH__FINALIZE_ON_CANCEL, etc.)
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: SleuthConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SleuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_retries, 2);
        assert!(!config.research.finalize_on_cancel);
        assert_eq!(config.research.max_document_chars, 4000);
        assert!(config.research.max_concurrent_searches.is_none());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = SleuthConfig::default();
        config.research.max_concurrent_searches = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_zero_snippet_limits_rejected() {
        let mut config = SleuthConfig::default();
        config.research.max_snippet_chars = 0;
        match config.validate() {
            Err(ConfigError::Invalid { message }) => {
                assert!(message.contains("max_snippet_chars"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }

        let mut config = SleuthConfig::default();
        config.research.max_document_chars = 0;
        match config.validate() {
            Err(ConfigError::Invalid { message }) => {
                assert!(message.contains("max_document_chars"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SleuthConfig::default();
        config.llm.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleuth.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[llm]\nprovider = \"gemini\"\nmodel = \"gemini-2.0-flash\"\n\n[research]\nfinalize_on_cancel = true"
        )
        .unwrap();

        let config = load_config(None, Some(&path), None).unwrap();
        assert_eq!(config.llm.provider, LlmProviderKind::Gemini);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert!(config.research.finalize_on_cancel);
        // Untouched sections keep their defaults
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = load_config(None, Some(Path::new("/nonexistent/sleuth.toml")), None);
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_workspace_config_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".sleuth")).unwrap();
        std::fs::write(
            dir.path().join(".sleuth").join("config.toml"),
            "[search]\nmax_results = 8\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.search.max_results, 8);
    }
}
