//! Iterative evidence-gathering research.
//!
//! A session runs bounded rounds of:
//! 1. **Plan**: turn the question (or the last round's gaps) into search queries
//! 2. **Dispatch**: run the queries concurrently and merge results into the evidence store
//! 3. **Reflect**: decide whether the evidence answers the question
//!
//! and ends with a cited answer synthesized from the full evidence store.

pub mod dispatcher;
pub mod documents;
pub mod engine;
pub mod events;
pub mod evidence;
pub mod output;
pub mod planner;
pub mod prompts;
pub mod reflection;
pub mod session;
pub mod synthesis;

pub use dispatcher::{RoundResult, SearchDispatcher, SearchFailure};
pub use documents::{DocumentKind, DocumentSnippet};
pub use engine::{Diagnostic, Orchestrator, ResearchRequest, SessionOutcome};
pub use events::{ChannelSink, EventSink, NoOpSink, RecordingSink, ResearchEvent, TracingSink};
pub use evidence::{EvidenceItem, EvidenceStore, Origin, RenderedEvidence, normalize_url};
pub use output::{OutputFormat, ReportGenerator};
pub use planner::{QueryPlan, QueryPlanner};
pub use reflection::{LlmReflector, Reflector, Verdict};
pub use session::{Budget, Effort, PhaseEvent, ResearchPhase, ResearchSession, SessionStatus};
pub use synthesis::{Answer, AnswerSynthesizer, Citation};
