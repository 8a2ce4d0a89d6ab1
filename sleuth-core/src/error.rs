//! Error types for the Sleuth research core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the language model, search, research phases, and configuration.

use std::path::PathBuf;

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum SleuthError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from language model provider interactions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Model output did not match the expected schema: {message}")]
    SchemaViolation { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Timeout { .. }
                | LlmError::Connection { .. }
                | LlmError::ServerError { .. }
        )
    }
}

/// Errors from the search capability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Search request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Search provider rate limited the request")]
    RateLimited,

    #[error("Transient search failure: {message}")]
    Transient { message: String },

    #[error("Search failed permanently: {message}")]
    Permanent { message: String },
}

impl SearchError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, SearchError::Permanent { .. })
    }
}

/// Errors raised by the research phases.
///
/// Planning, reflection, and synthesis errors are absorbed by the
/// orchestrator; only `Cancelled` and `Failed` reach the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResearchError {
    #[error("Query planning failed: {0}")]
    Planning(LlmError),

    #[error("Reflection failed: {0}")]
    Reflection(LlmError),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(LlmError),

    #[error("Research session was cancelled")]
    Cancelled,

    #[error("Research session failed: {reason}")]
    Failed { reason: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `SleuthError`.
pub type Result<T> = std::result::Result<T, SleuthError>;
