//! Answer synthesis with citation validation.
//!
//! The model is given the rendered evidence and cites items as `[n]` or
//! `[n, m]`. Markers pointing at indices that do not exist are stripped, and
//! the citation list holds the referenced items in order of first reference.
//!
//! Only brackets of one to three digit numbers that do not directly follow a
//! letter, digit or underscore are treated as markers, so prose like
//! "released in [2023]" and code like `a[0]` pass through untouched. A
//! citation glued to a word (`claim[1]`) is therefore left as written.

use super::evidence::EvidenceStore;
use super::prompts;
use crate::brain::Brain;
use crate::error::{LlmError, ResearchError};
use crate::types::{Message, PromptRole};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static CITATION_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\s?)\[(\d{1,3}(?:\s*,\s*\d{1,3})*)\]").ok());

/// One entry of the answer's source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub label: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The final answer of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// True when the answer is a flat source listing instead of a synthesis.
    pub degraded: bool,
}

pub struct AnswerSynthesizer {
    brain: Brain,
}

impl AnswerSynthesizer {
    pub fn new(brain: Brain) -> Self {
        Self { brain }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        evidence: &EvidenceStore,
    ) -> Result<Answer, ResearchError> {
        let response = self
            .brain
            .complete(
                PromptRole::Synthesis,
                vec![
                    Message::system(prompts::ANSWER_SYSTEM),
                    Message::user(prompts::answer(question, &evidence.render_context())),
                ],
                None,
            )
            .await
            .map_err(ResearchError::Synthesis)?;

        if response.text.trim().is_empty() {
            return Err(ResearchError::Synthesis(LlmError::ResponseParse {
                message: "model returned an empty answer".into(),
            }));
        }

        let (text, citations) = resolve_citations(response.text.trim(), evidence);
        debug!(citations = citations.len(), "Answer synthesized");
        Ok(Answer {
            text,
            citations,
            degraded: false,
        })
    }
}

/// Strip dangling citation markers and collect the referenced items.
pub fn resolve_citations(text: &str, evidence: &EvidenceStore) -> (String, Vec<Citation>) {
    let Some(marker) = CITATION_MARKER.as_ref() else {
        return (text.to_string(), Vec::new());
    };
    let mut referenced: Vec<usize> = Vec::new();

    let cleaned = marker.replace_all(text, |caps: &Captures| {
        let start = caps.get(0).map_or(0, |m| m.start());
        let follows_identifier = caps[1].is_empty()
            && text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if follows_identifier {
            return caps[0].to_string();
        }
        let valid: Vec<usize> = caps[2]
            .split(',')
            .filter_map(|n| n.trim().parse::<usize>().ok())
            .filter(|n| evidence.contains_index(*n))
            .collect();
        if valid.is_empty() {
            return String::new();
        }
        for n in &valid {
            if !referenced.contains(n) {
                referenced.push(*n);
            }
        }
        let joined = valid
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}[{}]", &caps[1], joined)
    });

    let citations = referenced
        .into_iter()
        .filter_map(|n| evidence.get(n))
        .map(|item| Citation {
            index: item.citation_index,
            label: item.label.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
        })
        .collect();

    (cleaned.into_owned(), citations)
}

/// Flat listing of the gathered sources, used when synthesis is unavailable.
pub fn degraded_answer(question: &str, evidence: &EvidenceStore) -> Answer {
    if evidence.is_empty() {
        return Answer {
            text: format!("No evidence could be gathered for \"{question}\"."),
            citations: Vec::new(),
            degraded: true,
        };
    }

    let mut text = format!(
        "A synthesized answer for \"{question}\" is unavailable. Sources gathered:\n"
    );
    for item in evidence.render() {
        if item.snippet.is_empty() {
            text.push_str(&format!("\n[{}] {}", item.index, item.label));
        } else {
            text.push_str(&format!("\n[{}] {}: {}", item.index, item.label, item.snippet));
        }
    }

    let citations = evidence
        .all()
        .iter()
        .map(|item| Citation {
            index: item.citation_index,
            label: item.label.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
        })
        .collect();

    Answer {
        text,
        citations,
        degraded: true,
    }
}
