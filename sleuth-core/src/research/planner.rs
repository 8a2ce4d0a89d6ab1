//! Query planner: turns the question and known gaps into search queries.

use super::prompts;
use crate::brain::Brain;
use crate::error::ResearchError;
use crate::types::{Message, PromptRole};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// Queries produced for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub queries: Vec<String>,
    pub rationale: Option<String>,
}

impl QueryPlan {
    /// The degraded plan used when planning fails: the question itself.
    ///
    /// A blank question yields an empty plan.
    pub fn fallback(question: &str) -> Self {
        Self {
            queries: sanitize_queries(vec![question.to_string()], 1),
            rationale: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchQueryList {
    query: Vec<String>,
    #[serde(default)]
    rationale: String,
}

pub struct QueryPlanner {
    brain: Brain,
}

impl QueryPlanner {
    pub fn new(brain: Brain) -> Self {
        Self { brain }
    }

    /// Queries for round 0.
    pub async fn initial_queries(
        &self,
        question: &str,
        count: usize,
    ) -> Result<QueryPlan, ResearchError> {
        self.plan(prompts::initial_queries(question, count), count)
            .await
    }

    /// Queries for later rounds, steered by the reflector's gaps and suggestions.
    pub async fn follow_up_queries(
        &self,
        question: &str,
        gaps: &[String],
        suggested: &[String],
        count: usize,
    ) -> Result<QueryPlan, ResearchError> {
        self.plan(
            prompts::follow_up_queries(question, gaps, suggested, count),
            count,
        )
        .await
    }

    async fn plan(&self, prompt: String, count: usize) -> Result<QueryPlan, ResearchError> {
        if count == 0 {
            return Ok(QueryPlan::default());
        }
        let reply: SearchQueryList = self
            .brain
            .complete_structured(
                PromptRole::QueryPlanning,
                prompts::query_list_schema(),
                vec![
                    Message::system(prompts::QUERY_WRITER_SYSTEM),
                    Message::user(prompt),
                ],
            )
            .await
            .map_err(ResearchError::Planning)?;

        let returned = reply.query.len();
        let queries = sanitize_queries(reply.query, count);
        debug!(returned, kept = queries.len(), count, "Planned queries");

        let rationale = Some(reply.rationale.trim().to_string()).filter(|r| !r.is_empty());
        Ok(QueryPlan { queries, rationale })
    }
}

/// Trim, drop empty and duplicate (case-insensitive) queries, keep the first `count`.
pub fn sanitize_queries(raw: Vec<String>, count: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::{LlmConfig, RetryConfig};
    use crate::error::LlmError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn planner(provider: Arc<MockLlmProvider>) -> QueryPlanner {
        let retry = RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            backoff_multiplier: 1.0,
            jitter: false,
        };
        QueryPlanner::new(Brain::new(provider, &LlmConfig::default(), retry))
    }

    #[test]
    fn test_sanitize_queries() {
        let raw = vec![
            " rust async ".to_string(),
            "".to_string(),
            "Rust Async".to_string(),
            "tokio runtime".to_string(),
            "   ".to_string(),
            "async-std".to_string(),
        ];
        assert_eq!(
            sanitize_queries(raw, 2),
            vec!["rust async".to_string(), "tokio runtime".to_string()]
        );
    }

    #[test]
    fn test_fallback_uses_trimmed_question() {
        assert_eq!(
            QueryPlan::fallback("  How do tides work? ").queries,
            vec!["How do tides work?"]
        );
        assert!(QueryPlan::fallback("   ").queries.is_empty());
    }

    #[tokio::test]
    async fn test_truncates_to_count() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_json(
            PromptRole::QueryPlanning,
            json!({"query": ["a", "b", "c", "d"], "rationale": "coverage"}),
        );
        let plan = planner(provider).initial_queries("Q", 3).await.unwrap();
        assert_eq!(plan.queries, vec!["a", "b", "c"]);
        assert_eq!(plan.rationale.as_deref(), Some("coverage"));
    }

    #[tokio::test]
    async fn test_fewer_queries_are_not_padded() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_json(
            PromptRole::QueryPlanning,
            json!({"query": ["only one", "only one"], "rationale": ""}),
        );
        let plan = planner(provider).initial_queries("Q", 5).await.unwrap();
        assert_eq!(plan.queries, vec!["only one"]);
        assert_eq!(plan.rationale, None);
    }

    #[tokio::test]
    async fn test_follow_up_prompt_carries_gaps() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_json(PromptRole::QueryPlanning, json!({"query": ["gap query"]}));
        let plan = planner(provider.clone())
            .follow_up_queries("Q", &["pricing".to_string()], &[], 1)
            .await
            .unwrap();
        assert_eq!(plan.queries, vec!["gap query"]);
        let request = &provider.requests()[0];
        assert!(request.messages[1].content.contains("- pricing"));
        assert!(request.response_schema.is_some());
    }

    #[tokio::test]
    async fn test_model_failure_is_planning_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(
            PromptRole::QueryPlanning,
            LlmError::AuthFailed {
                provider: "mock".into(),
            },
        );
        let result = planner(provider).initial_queries("Q", 3).await;
        assert!(matches!(result, Err(ResearchError::Planning(_))));
    }

    #[tokio::test]
    async fn test_malformed_output_is_planning_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_text(PromptRole::QueryPlanning, "here are some ideas: rust, tokio");
        let result = planner(provider).initial_queries("Q", 3).await;
        assert!(matches!(
            result,
            Err(ResearchError::Planning(LlmError::SchemaViolation { .. }))
        ));
    }
}
