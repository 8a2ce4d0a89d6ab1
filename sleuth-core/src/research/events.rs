//! Progress events emitted by the orchestrator, and sinks that consume them.
//!
//! Events are emitted in order and awaited one at a time, so every sink sees
//! a session's events in the order they happened.

use super::reflection::Verdict;
use super::session::{ResearchPhase, SessionStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    QueriesGenerated {
        round: usize,
        queries: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },
    EvidenceGathered {
        round: usize,
        /// Items returned by this round's searches, before dedup.
        count: usize,
        /// Store size after the round was merged.
        total: usize,
        distinct_labels: Vec<String>,
        failures: usize,
    },
    Reflected {
        round: usize,
        verdict: Verdict,
    },
    /// An error absorbed by the orchestrator.
    Diagnostic {
        stage: ResearchPhase,
        message: String,
    },
    Finalized {
        status: SessionStatus,
        citations: usize,
    },
}

/// Receiver of research progress events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &ResearchEvent);
}

/// Discards every event.
pub struct NoOpSink;

#[async_trait]
impl EventSink for NoOpSink {
    async fn emit(&self, _event: &ResearchEvent) {}
}

/// Keeps every event for later replay.
pub struct RecordingSink {
    events: Mutex<Vec<ResearchEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub async fn events(&self) -> Vec<ResearchEvent> {
        self.events.lock().await.clone()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: &ResearchEvent) {
        self.events.lock().await.push(event.clone());
    }
}

/// Forwards events into a bounded tokio channel.
///
/// A full channel applies backpressure to the orchestrator. A dropped
/// receiver is tolerated: the research keeps running without a listener.
pub struct ChannelSink {
    tx: mpsc::Sender<ResearchEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ResearchEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResearchEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: &ResearchEvent) {
        if self.tx.send(event.clone()).await.is_err() {
            debug!("Event receiver dropped; discarding research event");
        }
    }
}

/// Logs each event through `tracing`.
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn emit(&self, event: &ResearchEvent) {
        match event {
            ResearchEvent::QueriesGenerated { round, queries, .. } => {
                info!(round, queries = ?queries, "Queries generated");
            }
            ResearchEvent::EvidenceGathered {
                round,
                count,
                total,
                failures,
                ..
            } => {
                info!(round, count, total, failures, "Evidence gathered");
            }
            ResearchEvent::Reflected { round, verdict } => {
                info!(round, sufficient = verdict.is_sufficient(), "Reflected");
            }
            ResearchEvent::Diagnostic { stage, message } => {
                warn!(%stage, message = %message, "Research diagnostic");
            }
            ResearchEvent::Finalized { status, citations } => {
                info!(%status, citations, "Research finalized");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        for round in 0..3 {
            sink.emit(&ResearchEvent::Reflected {
                round,
                verdict: Verdict::Sufficient,
            })
            .await;
        }
        let rounds: Vec<usize> = sink
            .events()
            .await
            .into_iter()
            .map(|e| match e {
                ResearchEvent::Reflected { round, .. } => round,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(rounds, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let event = ResearchEvent::Finalized {
            status: SessionStatus::Exhausted,
            citations: 2,
        };
        sink.emit(&event).await;
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        sink.emit(&ResearchEvent::Diagnostic {
            stage: ResearchPhase::Planning,
            message: "x".into(),
        })
        .await;
    }

    #[test]
    fn test_event_serde_tag() {
        let event = ResearchEvent::QueriesGenerated {
            round: 0,
            queries: vec!["q".into()],
            rationale: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "queries_generated", "round": 0, "queries": ["q"]})
        );
    }
}
