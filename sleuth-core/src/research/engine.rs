//! Research orchestrator: drives plan → dispatch → reflect rounds to an answer.
//!
//! The orchestrator is the single writer of a [`ResearchSession`]. Each loop
//! iteration performs the work of the current phase, then hands a
//! [`PhaseEvent`] to the transition table. Capability errors are absorbed
//! here and surfaced as diagnostics; only cancellation and total search
//! unavailability end a session without an answer.
//!
//! Cancellation is observed at every suspension point. A round interrupted
//! by cancellation is discarded as a whole, including queries that already
//! completed.

use super::dispatcher::{SearchDispatcher, SearchFailure};
use super::documents::DocumentSnippet;
use super::events::{EventSink, NoOpSink, ResearchEvent};
use super::evidence::EvidenceItem;
use super::planner::{QueryPlan, QueryPlanner};
use super::reflection::{LlmReflector, Reflector, Verdict};
use super::session::{Effort, PhaseEvent, ResearchPhase, ResearchSession, SessionStatus};
use super::synthesis::{Answer, AnswerSynthesizer, degraded_answer};
use crate::brain::{Brain, LlmProvider};
use crate::config::{ResearchConfig, SleuthConfig};
use crate::error::{ResearchError, SleuthError};
use crate::providers::create_provider;
use crate::search::{SearchProvider, create_search_provider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A question submitted for research.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub question: String,
    #[serde(default)]
    pub effort: Effort,
    /// Pre-extracted document text, seeded as evidence before round 0.
    #[serde(default)]
    pub documents: Vec<DocumentSnippet>,
}

impl ResearchRequest {
    pub fn new(question: impl Into<String>, effort: Effort) -> Self {
        Self {
            question: question.into(),
            effort,
            documents: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: DocumentSnippet) -> Self {
        self.documents.push(document);
        self
    }
}

/// An absorbed error, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: ResearchPhase,
    pub message: String,
}

/// Summary of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub id: Uuid,
    pub question: String,
    pub effort: Effort,
    /// Rounds whose search results were merged.
    pub rounds: usize,
    /// Terminal status; never `InProgress`.
    pub status: SessionStatus,
    /// Present for `Sufficient` and `Exhausted`, and for `Cancelled` when
    /// finalize-on-cancel produced a degraded answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Answer>,
    /// Final evidence store contents in citation order.
    pub evidence: Vec<EvidenceItem>,
    /// Per-query search failures from every round.
    pub failures: Vec<SearchFailure>,
    /// Absorbed planner, reflector and synthesis errors.
    pub diagnostics: Vec<Diagnostic>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionOutcome {
    /// The answer, or the session-level error that prevented one.
    pub fn into_result(self) -> Result<Answer, ResearchError> {
        match self.status {
            SessionStatus::Cancelled => Err(ResearchError::Cancelled),
            SessionStatus::Failed => Err(ResearchError::Failed {
                reason: self
                    .diagnostics
                    .last()
                    .map(|d| d.message.clone())
                    .unwrap_or_else(|| "no evidence could be gathered".to_string()),
            }),
            _ => self.answer.ok_or_else(|| ResearchError::Failed {
                reason: "session finished without an answer".to_string(),
            }),
        }
    }
}

/// Cross-round state the orchestrator carries from reflection to planning.
struct LoopState {
    gaps: Vec<String>,
    suggested: Vec<String>,
    follow_up_count: usize,
    failures: Vec<SearchFailure>,
    diagnostics: Vec<Diagnostic>,
}

pub struct Orchestrator {
    planner: QueryPlanner,
    dispatcher: SearchDispatcher,
    reflector: Arc<dyn Reflector>,
    synthesizer: AnswerSynthesizer,
    sink: Arc<dyn EventSink>,
    config: ResearchConfig,
}

impl Orchestrator {
    /// Build an orchestrator over the given capabilities.
    ///
    /// Uses [`LlmReflector`] and discards events until a sink is attached.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        config: &SleuthConfig,
    ) -> Self {
        let brain = Brain::new(llm, &config.llm, config.retry.clone());
        Self {
            planner: QueryPlanner::new(brain.clone()),
            dispatcher: SearchDispatcher::new(
                search,
                &config.search,
                config.retry.clone(),
                config.research.max_concurrent_searches,
                config.research.max_snippet_chars,
            ),
            reflector: Arc::new(LlmReflector::new(brain.clone())),
            synthesizer: AnswerSynthesizer::new(brain),
            sink: Arc::new(NoOpSink),
            config: config.research.clone(),
        }
    }

    /// Build the providers named in `config` and an orchestrator over them.
    pub fn from_config(config: &SleuthConfig) -> Result<Self, SleuthError> {
        let llm = create_provider(&config.llm)?;
        let search = create_search_provider(&config.search)?;
        Ok(Self::new(llm, search, config))
    }

    pub fn with_reflector(mut self, reflector: Arc<dyn Reflector>) -> Self {
        self.reflector = reflector;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run one research session to completion or cancellation.
    pub async fn run(&self, request: ResearchRequest, cancel: CancellationToken) -> SessionOutcome {
        let mut session = ResearchSession::new(request.question, request.effort);
        let mut state = LoopState {
            gaps: Vec::new(),
            suggested: Vec::new(),
            follow_up_count: session.budget.initial_query_count,
            failures: Vec::new(),
            diagnostics: Vec::new(),
        };

        info!(
            session = %session.id,
            effort = %session.effort,
            queries = session.budget.initial_query_count,
            max_rounds = session.budget.max_rounds,
            "Research session started"
        );

        while session.is_active() {
            if cancel.is_cancelled() {
                self.cancel(&mut session);
                break;
            }

            match session.phase {
                ResearchPhase::Init => {
                    self.seed_documents(&mut session, &request.documents);
                    session.apply(PhaseEvent::Seeded);
                }
                ResearchPhase::Planning => {
                    let Some(plan) = until_cancelled(&cancel, self.plan(&session, &state)).await
                    else {
                        continue;
                    };
                    let plan = match plan {
                        Ok(plan) => plan,
                        Err(e) => {
                            self.absorb(&mut state, ResearchPhase::Planning, &e).await;
                            QueryPlan::fallback(&session.question)
                        }
                    };
                    if !plan.queries.is_empty() {
                        self.sink
                            .emit(&ResearchEvent::QueriesGenerated {
                                round: session.round,
                                queries: plan.queries.clone(),
                                rationale: plan.rationale.clone(),
                            })
                            .await;
                    }
                    let query_count = plan.queries.len();
                    session.pending_queries = plan.queries;
                    session.apply(PhaseEvent::Planned { query_count });
                }
                ResearchPhase::Dispatching => {
                    let queries = std::mem::take(&mut session.pending_queries);
                    let Some(round) = until_cancelled(&cancel, self.dispatcher.run(&queries)).await
                    else {
                        debug!(round = session.round, "Discarding cancelled round");
                        continue;
                    };

                    let items = round.items();
                    let mut distinct_labels: Vec<String> = Vec::new();
                    for item in &items {
                        if !distinct_labels.contains(&item.label) {
                            distinct_labels.push(item.label.clone());
                        }
                    }
                    let count = items.len();
                    for item in items {
                        session.evidence.add_or_merge(item);
                    }
                    let failures = round.failures();

                    self.sink
                        .emit(&ResearchEvent::EvidenceGathered {
                            round: session.round,
                            count,
                            total: session.evidence.len(),
                            distinct_labels,
                            failures: failures.len(),
                        })
                        .await;
                    state.failures.extend(failures);

                    let unreachable = round.all_unreachable() && session.evidence.is_empty();
                    if unreachable {
                        let e = ResearchError::Failed {
                            reason: format!(
                                "search unreachable: all {} queries of round {} failed",
                                queries.len(),
                                session.round
                            ),
                        };
                        self.absorb(&mut state, ResearchPhase::Dispatching, &e).await;
                    }
                    session.apply(PhaseEvent::Dispatched { unreachable });
                }
                ResearchPhase::Reflecting => {
                    let max_follow_ups = session.budget.initial_query_count;
                    let Some(verdict) = until_cancelled(
                        &cancel,
                        self.reflector
                            .reflect(&session.question, &session.evidence, max_follow_ups),
                    )
                    .await
                    else {
                        continue;
                    };
                    let verdict = match verdict {
                        Ok(v) => v,
                        Err(e) => {
                            self.absorb(&mut state, ResearchPhase::Reflecting, &e).await;
                            Verdict::Sufficient
                        }
                    };

                    self.sink
                        .emit(&ResearchEvent::Reflected {
                            round: session.round,
                            verdict: verdict.clone(),
                        })
                        .await;

                    let sufficient = verdict.is_sufficient();
                    if let Verdict::Insufficient {
                        gaps,
                        follow_up_query_count,
                        suggested_queries,
                    } = verdict
                    {
                        state.gaps = gaps;
                        state.suggested = suggested_queries;
                        state.follow_up_count = follow_up_query_count;
                    }
                    session.apply(PhaseEvent::Reflected { sufficient });
                }
                ResearchPhase::Finalizing => {
                    let Some(answer) = until_cancelled(
                        &cancel,
                        self.synthesizer
                            .synthesize(&session.question, &session.evidence),
                    )
                    .await
                    else {
                        continue;
                    };
                    let answer = match answer {
                        Ok(answer) => answer,
                        Err(e) => {
                            self.absorb(&mut state, ResearchPhase::Finalizing, &e).await;
                            degraded_answer(&session.question, &session.evidence)
                        }
                    };
                    session.final_answer = Some(answer);
                    session.apply(PhaseEvent::Finalized);
                }
                ResearchPhase::Done | ResearchPhase::Cancelled | ResearchPhase::Failed => break,
            }
        }

        let citations = session
            .final_answer
            .as_ref()
            .map(|a| a.citations.len())
            .unwrap_or(0);
        self.sink
            .emit(&ResearchEvent::Finalized {
                status: session.status,
                citations,
            })
            .await;

        info!(
            session = %session.id,
            status = %session.status,
            rounds = session.rounds_dispatched,
            evidence = session.evidence.len(),
            failures = state.failures.len(),
            "Research session finished"
        );

        SessionOutcome {
            id: session.id,
            question: session.question,
            effort: session.effort,
            rounds: session.rounds_dispatched,
            status: session.status,
            answer: session.final_answer,
            evidence: session.evidence.all().to_vec(),
            failures: state.failures,
            diagnostics: state.diagnostics,
            started_at: session.created_at,
            finished_at: session.updated_at,
        }
    }

    async fn plan(
        &self,
        session: &ResearchSession,
        state: &LoopState,
    ) -> Result<QueryPlan, ResearchError> {
        if session.round == 0 {
            self.planner
                .initial_queries(&session.question, session.budget.initial_query_count)
                .await
        } else {
            self.planner
                .follow_up_queries(
                    &session.question,
                    &state.gaps,
                    &state.suggested,
                    state.follow_up_count,
                )
                .await
        }
    }

    fn seed_documents(&self, session: &mut ResearchSession, documents: &[DocumentSnippet]) {
        for doc in documents {
            if doc.text.trim().is_empty() {
                debug!(label = %doc.label, "Skipping empty document snippet");
                continue;
            }
            let item = EvidenceItem::from_document(doc, self.config.max_document_chars);
            session.evidence.add_or_merge(item);
        }
        if !documents.is_empty() {
            debug!(seeded = session.evidence.len(), "Document evidence seeded");
        }
    }

    fn cancel(&self, session: &mut ResearchSession) {
        if self.config.finalize_on_cancel && !session.evidence.is_empty() {
            session.final_answer = Some(degraded_answer(&session.question, &session.evidence));
        }
        info!(session = %session.id, phase = %session.phase, "Research session cancelled");
        session.apply(PhaseEvent::Cancel);
    }

    async fn absorb(&self, state: &mut LoopState, stage: ResearchPhase, error: &ResearchError) {
        warn!(%stage, error = %error, "Absorbed research error");
        let diagnostic = Diagnostic {
            stage,
            message: error.to_string(),
        };
        self.sink
            .emit(&ResearchEvent::Diagnostic {
                stage,
                message: diagnostic.message.clone(),
            })
            .await;
        state.diagnostics.push(diagnostic);
    }
}

/// Await `fut` unless `cancel` fires first.
///
/// Returns `None` when cancelled, including when the future completed in the
/// same instant the token was cancelled.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => (!cancel.is_cancelled()).then_some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::RetryConfig;
    use crate::research::events::RecordingSink;
    use crate::search::MockSearchProvider;
    use crate::types::PromptRole;
    use serde_json::json;

    fn test_config() -> SleuthConfig {
        SleuthConfig {
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                backoff_multiplier: 2.0,
                jitter: false,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_low_effort_single_round() {
        let llm = Arc::new(MockLlmProvider::new());
        llm.queue_json(PromptRole::QueryPlanning, json!({"query": ["what is x"], "rationale": "r"}));
        llm.queue_json(PromptRole::Reflection, json!({"is_sufficient": true}));
        llm.queue_text(PromptRole::Synthesis, "X is a letter [1].");
        let search = Arc::new(MockSearchProvider::new());
        let sink = Arc::new(RecordingSink::new());

        let outcome = Orchestrator::new(llm, search.clone(), &test_config())
            .with_sink(sink.clone())
            .run(ResearchRequest::new("X", Effort::Low), CancellationToken::new())
            .await;

        assert_eq!(outcome.status, SessionStatus::Sufficient);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(search.total_calls(), 1);
        let answer = outcome.answer.unwrap();
        assert_eq!(answer.citations.len(), 1);

        let events = sink.events().await;
        assert!(matches!(events[0], ResearchEvent::QueriesGenerated { .. }));
        assert!(matches!(
            events.last(),
            Some(ResearchEvent::Finalized {
                status: SessionStatus::Sufficient,
                citations: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let llm = Arc::new(MockLlmProvider::new());
        let search = Arc::new(MockSearchProvider::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = Orchestrator::new(llm.clone(), search.clone(), &test_config())
            .run(ResearchRequest::new("X", Effort::High), cancel)
            .await;

        assert_eq!(outcome.status, SessionStatus::Cancelled);
        assert!(outcome.answer.is_none());
        assert_eq!(search.total_calls(), 0);
        assert!(llm.requests().is_empty());
        assert!(matches!(
            outcome.into_result(),
            Err(ResearchError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_until_cancelled_prefers_cancel() {
        let cancel = CancellationToken::new();
        assert_eq!(until_cancelled(&cancel, async { 1 }).await, Some(1));
        cancel.cancel();
        assert_eq!(until_cancelled(&cancel, async { 1 }).await, None);
    }
}
