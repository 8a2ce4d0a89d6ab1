//! Research session state and the orchestrator's phase transition table.
//!
//! The loop is an explicit state machine: the orchestrator performs the work
//! of a phase, reports what happened as a [`PhaseEvent`], and [`transition`]
//! decides the next phase. Round budgeting lives entirely in the table, so it
//! can be tested without running any capability.

use super::evidence::EvidenceStore;
use super::synthesis::Answer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Caller-chosen research effort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    #[default]
    Medium,
    High,
}

/// Query and round allowance derived from an [`Effort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub initial_query_count: usize,
    pub max_rounds: usize,
}

impl Effort {
    /// Fixed budget table (version 1). Not caller-overridable.
    pub const fn budget(self) -> Budget {
        match self {
            Effort::Low => Budget {
                initial_query_count: 1,
                max_rounds: 1,
            },
            Effort::Medium => Budget {
                initial_query_count: 3,
                max_rounds: 3,
            },
            Effort::High => Budget {
                initial_query_count: 5,
                max_rounds: 10,
            },
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effort::Low => write!(f, "low"),
            Effort::Medium => write!(f, "medium"),
            Effort::High => write!(f, "high"),
        }
    }
}

impl FromStr for Effort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            other => Err(format!(
                "unknown effort '{other}' (expected low, medium or high)"
            )),
        }
    }
}

/// Externally visible session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    /// Finalized because the evidence was judged sufficient.
    Sufficient,
    /// Finalized because the round budget ran out. Not an error.
    Exhausted,
    Cancelled,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    /// Sufficient and exhausted both count as a successful finish.
    pub fn is_success(self) -> bool {
        matches!(self, SessionStatus::Sufficient | SessionStatus::Exhausted)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Running => "running",
            SessionStatus::Sufficient => "sufficient",
            SessionStatus::Exhausted => "exhausted",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Orchestrator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Init,
    Planning,
    Dispatching,
    Reflecting,
    Finalizing,
    Done,
    Cancelled,
    Failed,
}

impl ResearchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResearchPhase::Done | ResearchPhase::Cancelled | ResearchPhase::Failed
        )
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResearchPhase::Init => "init",
            ResearchPhase::Planning => "planning",
            ResearchPhase::Dispatching => "dispatching",
            ResearchPhase::Reflecting => "reflecting",
            ResearchPhase::Finalizing => "finalizing",
            ResearchPhase::Done => "done",
            ResearchPhase::Cancelled => "cancelled",
            ResearchPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// What the work of the current phase produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Budget resolved and document evidence seeded.
    Seeded,
    Planned { query_count: usize },
    /// `unreachable`: every query failed transiently and no evidence exists.
    Dispatched { unreachable: bool },
    Reflected { sufficient: bool },
    Finalized,
    Cancel,
}

/// Result of applying a [`PhaseEvent`] to a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub phase: ResearchPhase,
    pub round: usize,
    /// Status the session resolves to once it reaches a terminal phase.
    pub outcome: Option<SessionStatus>,
}

/// The orchestrator transition table.
///
/// Terminal phases absorb every event. An event that makes no sense for the
/// current phase moves the session to `Failed`.
pub fn transition(
    phase: ResearchPhase,
    event: PhaseEvent,
    round: usize,
    max_rounds: usize,
) -> Transition {
    let to = |phase, outcome| Transition {
        phase,
        round,
        outcome,
    };

    if phase.is_terminal() {
        return to(phase, None);
    }

    match (phase, event) {
        (_, PhaseEvent::Cancel) => to(ResearchPhase::Cancelled, Some(SessionStatus::Cancelled)),
        (ResearchPhase::Init, PhaseEvent::Seeded) => to(ResearchPhase::Planning, None),
        (ResearchPhase::Planning, PhaseEvent::Planned { query_count: 0 }) => {
            to(ResearchPhase::Finalizing, Some(SessionStatus::Sufficient))
        }
        (ResearchPhase::Planning, PhaseEvent::Planned { .. }) => {
            to(ResearchPhase::Dispatching, None)
        }
        (ResearchPhase::Dispatching, PhaseEvent::Dispatched { unreachable: true }) => {
            to(ResearchPhase::Failed, Some(SessionStatus::Failed))
        }
        (ResearchPhase::Dispatching, PhaseEvent::Dispatched { unreachable: false }) => {
            to(ResearchPhase::Reflecting, None)
        }
        (ResearchPhase::Reflecting, PhaseEvent::Reflected { sufficient: true }) => {
            to(ResearchPhase::Finalizing, Some(SessionStatus::Sufficient))
        }
        (ResearchPhase::Reflecting, PhaseEvent::Reflected { sufficient: false }) => {
            if round + 1 >= max_rounds {
                to(ResearchPhase::Finalizing, Some(SessionStatus::Exhausted))
            } else {
                Transition {
                    phase: ResearchPhase::Planning,
                    round: round + 1,
                    outcome: None,
                }
            }
        }
        (ResearchPhase::Finalizing, PhaseEvent::Finalized) => to(ResearchPhase::Done, None),
        (phase, event) => {
            tracing::warn!(%phase, ?event, "Illegal research phase transition");
            to(ResearchPhase::Failed, Some(SessionStatus::Failed))
        }
    }
}

/// The unit of work for one question. Mutated only by the orchestrator.
#[derive(Debug, Clone)]
pub struct ResearchSession {
    pub id: Uuid,
    /// The question as submitted.
    pub question: String,
    pub effort: Effort,
    /// Per-round query count and round limit, resolved from `effort`.
    pub budget: Budget,
    /// Current round, 0-based.
    pub round: usize,
    /// Number of rounds whose searches were dispatched and merged.
    pub rounds_dispatched: usize,
    pub phase: ResearchPhase,
    /// `InProgress` until a terminal phase is reached.
    pub status: SessionStatus,
    /// Queries awaiting dispatch in the current round.
    pub pending_queries: Vec<String>,
    /// Deduplicated sources gathered so far, documents first.
    pub evidence: EvidenceStore,
    /// Set only when the session finishes with an answer.
    pub final_answer: Option<Answer>,
    pub created_at: DateTime<Utc>,
    /// Bumped on every phase transition.
    pub updated_at: DateTime<Utc>,
    /// Status decided by the transition into `Finalizing`.
    outcome: Option<SessionStatus>,
}

impl ResearchSession {
    pub fn new(question: impl Into<String>, effort: Effort) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            effort,
            budget: effort.budget(),
            round: 0,
            rounds_dispatched: 0,
            phase: ResearchPhase::Init,
            status: SessionStatus::Running,
            pending_queries: Vec::new(),
            evidence: EvidenceStore::new(),
            final_answer: None,
            created_at: now,
            updated_at: now,
            outcome: None,
        }
    }

    /// Apply a phase event and return the new phase.
    pub fn apply(&mut self, event: PhaseEvent) -> ResearchPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }
        let t = transition(self.phase, event, self.round, self.budget.max_rounds);
        tracing::debug!(
            session = %self.id,
            from = %self.phase,
            to = %t.phase,
            round = t.round,
            "Phase transition"
        );

        if matches!(event, PhaseEvent::Dispatched { .. }) {
            self.rounds_dispatched += 1;
        }
        self.phase = t.phase;
        self.round = t.round;
        if t.outcome.is_some() {
            self.outcome = t.outcome;
        }
        if t.phase.is_terminal() {
            self.status = self.outcome.unwrap_or(SessionStatus::Sufficient);
        }
        self.updated_at = Utc::now();
        self.phase
    }

    pub fn is_active(&self) -> bool {
        !self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_table() {
        assert_eq!(
            Effort::Low.budget(),
            Budget {
                initial_query_count: 1,
                max_rounds: 1
            }
        );
        assert_eq!(
            Effort::Medium.budget(),
            Budget {
                initial_query_count: 3,
                max_rounds: 3
            }
        );
        assert_eq!(
            Effort::High.budget(),
            Budget {
                initial_query_count: 5,
                max_rounds: 10
            }
        );
    }

    #[test]
    fn test_effort_parse_and_display() {
        assert_eq!("HIGH".parse::<Effort>().unwrap(), Effort::High);
        assert!("extreme".parse::<Effort>().is_err());
        assert_eq!(Effort::Low.to_string(), "low");
    }

    #[test]
    fn test_happy_path_single_round() {
        let mut s = ResearchSession::new("Q?", Effort::Medium);
        assert_eq!(s.apply(PhaseEvent::Seeded), ResearchPhase::Planning);
        assert_eq!(
            s.apply(PhaseEvent::Planned { query_count: 3 }),
            ResearchPhase::Dispatching
        );
        assert_eq!(
            s.apply(PhaseEvent::Dispatched { unreachable: false }),
            ResearchPhase::Reflecting
        );
        assert_eq!(
            s.apply(PhaseEvent::Reflected { sufficient: true }),
            ResearchPhase::Finalizing
        );
        assert_eq!(s.status, SessionStatus::Running);
        assert_eq!(s.apply(PhaseEvent::Finalized), ResearchPhase::Done);
        assert_eq!(s.status, SessionStatus::Sufficient);
        assert_eq!(s.rounds_dispatched, 1);
    }

    #[test]
    fn test_insufficient_loops_until_budget() {
        let mut s = ResearchSession::new("Q?", Effort::Medium);
        s.apply(PhaseEvent::Seeded);
        let mut cycles = 0;
        while s.phase == ResearchPhase::Planning {
            assert!(s.round < s.budget.max_rounds);
            s.apply(PhaseEvent::Planned { query_count: 1 });
            s.apply(PhaseEvent::Dispatched { unreachable: false });
            s.apply(PhaseEvent::Reflected { sufficient: false });
            cycles += 1;
        }
        assert_eq!(cycles, 3);
        assert_eq!(s.round, 2);
        assert_eq!(s.phase, ResearchPhase::Finalizing);
        s.apply(PhaseEvent::Finalized);
        assert_eq!(s.status, SessionStatus::Exhausted);
    }

    #[test]
    fn test_empty_plan_finalizes() {
        let t = transition(
            ResearchPhase::Planning,
            PhaseEvent::Planned { query_count: 0 },
            0,
            3,
        );
        assert_eq!(t.phase, ResearchPhase::Finalizing);
        assert_eq!(t.outcome, Some(SessionStatus::Sufficient));
    }

    #[test]
    fn test_unreachable_round_fails() {
        let mut s = ResearchSession::new("Q?", Effort::Low);
        s.apply(PhaseEvent::Seeded);
        s.apply(PhaseEvent::Planned { query_count: 1 });
        assert_eq!(
            s.apply(PhaseEvent::Dispatched { unreachable: true }),
            ResearchPhase::Failed
        );
        assert_eq!(s.status, SessionStatus::Failed);
    }

    #[test]
    fn test_cancel_from_any_active_phase() {
        for phase in [
            ResearchPhase::Init,
            ResearchPhase::Planning,
            ResearchPhase::Dispatching,
            ResearchPhase::Reflecting,
            ResearchPhase::Finalizing,
        ] {
            let t = transition(phase, PhaseEvent::Cancel, 0, 1);
            assert_eq!(t.phase, ResearchPhase::Cancelled);
        }
    }

    #[test]
    fn test_terminal_phases_are_immutable() {
        let mut s = ResearchSession::new("Q?", Effort::Low);
        s.apply(PhaseEvent::Cancel);
        assert_eq!(s.status, SessionStatus::Cancelled);
        assert_eq!(s.apply(PhaseEvent::Seeded), ResearchPhase::Cancelled);
        assert_eq!(s.status, SessionStatus::Cancelled);
    }

    #[test]
    fn test_illegal_event_fails() {
        let t = transition(ResearchPhase::Init, PhaseEvent::Finalized, 0, 1);
        assert_eq!(t.phase, ResearchPhase::Failed);
    }
}
