//! Sufficiency reflection over the accumulated evidence.
//!
//! The sufficiency heuristic is model-dependent, so it sits behind the
//! [`Reflector`] trait. [`LlmReflector`] is the default policy.

use super::evidence::EvidenceStore;
use super::prompts;
use crate::brain::Brain;
use crate::error::ResearchError;
use crate::types::{Message, PromptRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The reflector's judgement of the evidence so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Sufficient,
    Insufficient {
        gaps: Vec<String>,
        follow_up_query_count: usize,
        /// Queries proposed by the reflector, passed to the planner as hints.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggested_queries: Vec<String>,
    },
}

impl Verdict {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, Verdict::Sufficient)
    }
}

/// Pluggable sufficiency policy.
#[async_trait]
pub trait Reflector: Send + Sync {
    /// Judge `evidence` against `question`.
    ///
    /// `max_follow_ups` bounds the `follow_up_query_count` of an
    /// insufficient verdict. The orchestrator passes the session's per-round
    /// query count (`Budget::initial_query_count`), so a follow-up round never
    /// searches more queries than the first one.
    async fn reflect(
        &self,
        question: &str,
        evidence: &EvidenceStore,
        max_follow_ups: usize,
    ) -> Result<Verdict, ResearchError>;
}

#[derive(Debug, Deserialize)]
struct ReflectionReply {
    is_sufficient: bool,
    #[serde(default)]
    knowledge_gap: String,
    #[serde(default)]
    knowledge_gaps: Vec<String>,
    #[serde(default)]
    follow_up_queries: Vec<String>,
}

impl ReflectionReply {
    fn into_verdict(self, max_follow_ups: usize) -> Verdict {
        if self.is_sufficient {
            return Verdict::Sufficient;
        }

        let mut gaps: Vec<String> = Vec::new();
        for gap in std::iter::once(self.knowledge_gap).chain(self.knowledge_gaps) {
            let gap = gap.trim().to_string();
            if !gap.is_empty() && !gaps.contains(&gap) {
                gaps.push(gap);
            }
        }

        let suggested_queries: Vec<String> = self
            .follow_up_queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        Verdict::Insufficient {
            gaps,
            follow_up_query_count: suggested_queries.len().clamp(1, max_follow_ups.max(1)),
            suggested_queries,
        }
    }
}

/// Reflector backed by a structured model call.
pub struct LlmReflector {
    brain: Brain,
}

impl LlmReflector {
    pub fn new(brain: Brain) -> Self {
        Self { brain }
    }
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(
        &self,
        question: &str,
        evidence: &EvidenceStore,
        max_follow_ups: usize,
    ) -> Result<Verdict, ResearchError> {
        let reply: ReflectionReply = self
            .brain
            .complete_structured(
                PromptRole::Reflection,
                prompts::reflection_schema(),
                vec![
                    Message::system(prompts::REFLECTION_SYSTEM),
                    Message::user(prompts::reflection(
                        question,
                        &evidence.render_context(),
                        max_follow_ups,
                    )),
                ],
            )
            .await
            .map_err(ResearchError::Reflection)?;
        Ok(reply.into_verdict(max_follow_ups))
    }
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

    fn reflector(provider: Arc<MockLlmProvider>) -> LlmReflector {
        let retry = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        LlmReflector::new(Brain::new(provider, &LlmConfig::default(), retry))
    }

    fn reply(value: serde_json::Value) -> ReflectionReply {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sufficient_reply() {
        let v = reply(json!({"is_sufficient": true, "knowledge_gap": "", "follow_up_queries": []}));
        assert_eq!(v.into_verdict(3), Verdict::Sufficient);
    }

    #[test]
    fn test_follow_up_count_is_clamped() {
        let v = reply(json!({
            "is_sufficient": false,
            "knowledge_gap": "benchmarks",
            "follow_up_queries": ["a", "b", "c", "d", "e"]
        }));
        match v.into_verdict(3) {
            Verdict::Insufficient {
                gaps,
                follow_up_query_count,
                suggested_queries,
            } => {
                assert_eq!(gaps, vec!["benchmarks"]);
                assert_eq!(follow_up_query_count, 3);
                assert_eq!(suggested_queries.len(), 5);
            }
            other => panic!("expected insufficient, got {other:?}"),
        }
    }

    #[test]
    fn test_insufficient_without_queries_asks_for_one() {
        let v = reply(json!({
            "is_sufficient": false,
            "knowledge_gaps": ["pricing", "pricing", " "]
        }));
        assert_eq!(
            v.into_verdict(5),
            Verdict::Insufficient {
                gaps: vec!["pricing".to_string()],
                follow_up_query_count: 1,
                suggested_queries: vec![],
            }
        );
    }

    #[test]
    fn test_verdict_serde_tag() {
        let json = serde_json::to_value(Verdict::Sufficient).unwrap();
        assert_eq!(json, json!({"kind": "sufficient"}));
    }

    #[tokio::test]
    async fn test_reflector_sees_rendered_evidence() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_json(PromptRole::Reflection, json!({"is_sufficient": true}));
        let verdict = reflector(provider.clone())
            .reflect("Q?", &EvidenceStore::new(), 3)
            .await
            .unwrap();
        assert!(verdict.is_sufficient());
        assert!(
            provider.requests()[0].messages[1]
                .content
                .contains("(no evidence gathered)")
        );
    }

    #[tokio::test]
    async fn test_model_error_is_reflection_error() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_error(
            PromptRole::Reflection,
            LlmError::Timeout { timeout_secs: 60 },
        );
        let result = reflector(provider)
            .reflect("Q?", &EvidenceStore::new(), 3)
            .await;
        assert!(matches!(result, Err(ResearchError::Reflection(_))));
    }
}
