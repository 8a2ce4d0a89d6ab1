//! # Sleuth Core
//!
//! Core library for the Sleuth research assistant.
//! Provides the research orchestrator, the language model interface (brain)
//! and its HTTP providers, web search backends, retry policy, configuration,
//! and fundamental types.

pub mod brain;
pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod retry;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use config::{SleuthConfig, load_config};
pub use error::{ConfigError, LlmError, ResearchError, Result, SearchError, SleuthError};
pub use research::{
    Answer, Citation, DocumentSnippet, Effort, EventSink, Orchestrator, ResearchEvent,
    ResearchRequest, SessionOutcome, SessionStatus, Verdict,
};
pub use search::{MockSearchProvider, SearchHit, SearchProvider};
pub use types::{CompletionRequest, CompletionResponse, Message, PromptRole, Role, TokenUsage};
