//! Brain module: language model provider abstraction and structured calls.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions and the
//! `Brain` wrapper that adds timeouts, retries, and structured (JSON) output
//! parsing on top of any provider.

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::retry::with_retry;
use crate::types::{CompletionRequest, CompletionResponse, Message, PromptRole, TokenUsage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for language model providers.
///
/// Implementations are stateless and safe to call concurrently.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Retrying, timeout-bounded front for an `LlmProvider`.
#[derive(Clone)]
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, llm: &LlmConfig, retry: RetryConfig) -> Self {
        Self {
            provider,
            retry,
            timeout: llm.timeout(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Run one completion with per-attempt timeout and transient retries.
    pub async fn complete(
        &self,
        role: PromptRole,
        messages: Vec<Message>,
        schema: Option<serde_json::Value>,
    ) -> Result<CompletionResponse, LlmError> {
        let mut request = CompletionRequest::new(role, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(schema) = schema {
            request = request.with_schema(schema);
        }

        let provider = self.provider.clone();
        let response = with_retry(&self.retry, self.timeout, || {
            let provider = provider.clone();
            let request = request.clone();
            async move { provider.complete(request).await }
        })
        .await?;

        debug!(
            role = %role,
            model = %response.model,
            tokens = response.usage.total(),
            "Completion received"
        );
        Ok(response)
    }

    /// Run a completion whose answer must deserialize into `T`.
    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        role: PromptRole,
        schema: serde_json::Value,
        messages: Vec<Message>,
    ) -> Result<T, LlmError> {
        let response = self.complete(role, messages, Some(schema)).await?;
        parse_structured(&response.text)
    }
}

/// Deserialize the outermost JSON object found in a model answer.
///
/// Models often wrap JSON in prose or code fences; everything outside the
/// first `{` and the last `}` is ignored.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let json = extract_json_object(text).ok_or_else(|| LlmError::SchemaViolation {
        message: format!("no JSON object in model output ({} chars)", text.len()),
    })?;
    serde_json::from_str(json).map_err(|e| LlmError::SchemaViolation {
        message: e.to_string(),
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Scripted reply for the mock provider.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(LlmError),
}

/// A mock LLM provider for testing and development.
///
/// Replies are queued per prompt role. When a role's queue holds a single
/// reply it is repeated for every further call, so "always insufficient"
/// reflectors need one entry only.
pub struct MockLlmProvider {
    model: String,
    replies: std::sync::Mutex<HashMap<PromptRole, VecDeque<MockReply>>>,
    calls: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            replies: std::sync::Mutex::new(HashMap::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queue a text reply for the given role.
    pub fn queue_text(&self, role: PromptRole, text: impl Into<String>) {
        self.queue(role, MockReply::Text(text.into()));
    }

    /// Queue a JSON reply for the given role.
    pub fn queue_json(&self, role: PromptRole, value: serde_json::Value) {
        self.queue(role, MockReply::Text(value.to_string()));
    }

    /// Queue an error for the given role.
    pub fn queue_error(&self, role: PromptRole, error: LlmError) {
        self.queue(role, MockReply::Error(error));
    }

    fn queue(&self, role: PromptRole, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(reply);
    }

    /// Number of completion calls made for a role.
    pub fn call_count(&self, role: PromptRole) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.role == role)
            .count()
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, role: PromptRole) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(&role)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let role = request.role;
        self.calls.lock().unwrap().push(request);
        match self.next_reply(role) {
            Some(MockReply::Text(text)) => Ok(CompletionResponse {
                text,
                usage: TokenUsage {
                    input_tokens: 100,
                    output_tokens: 50,
                },
                model: self.model.clone(),
                finish_reason: Some("stop".to_string()),
            }),
            Some(MockReply::Error(e)) => Err(e),
            None => Err(LlmError::ApiRequest {
                message: format!("mock has no reply queued for role {role}"),
            }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
