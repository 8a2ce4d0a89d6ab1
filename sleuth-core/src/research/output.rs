//! Research report rendering.

use super::engine::SessionOutcome;
use super::session::SessionStatus;
use serde::{Deserialize, Serialize};

/// Output format for research reports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Answer text followed by a numbered source list.
    #[default]
    Markdown,
    /// The full session outcome as pretty-printed JSON.
    Json,
}

/// Renders session outcomes for display or machine consumption.
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn render(
        outcome: &SessionOutcome,
        format: OutputFormat,
    ) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Markdown => Ok(Self::markdown(outcome)),
            OutputFormat::Json => serde_json::to_string_pretty(outcome),
        }
    }

    pub fn markdown(outcome: &SessionOutcome) -> String {
        let mut out = format!("# {}\n\n", outcome.question);

        match &outcome.answer {
            Some(answer) => {
                out.push_str(&answer.text);
                out.push('\n');
                if !answer.citations.is_empty() {
                    out.push_str("\n## Sources\n\n");
                    for c in &answer.citations {
                        match &c.url {
                            Some(url) => {
                                let title = if c.title.is_empty() { &c.label } else { &c.title };
                                out.push_str(&format!(
                                    "{}. [{}]({}) ({})\n",
                                    c.index, title, url, c.label
                                ));
                            }
                            None => out.push_str(&format!("{}. {}\n", c.index, c.label)),
                        }
                    }
                }
            }
            None => out.push_str(&format!("_No answer ({})._\n", outcome.status)),
        }

        out.push_str(&format!(
            "\n---\n**Status:** {} | **Effort:** {} | **Rounds:** {} | **Evidence:** {}",
            outcome.status,
            outcome.effort,
            outcome.rounds,
            outcome.evidence.len()
        ));
        if !outcome.failures.is_empty() {
            out.push_str(&format!(" | **Failed searches:** {}", outcome.failures.len()));
        }
        if outcome.answer.as_ref().is_some_and(|a| a.degraded)
            && outcome.status != SessionStatus::Cancelled
        {
            out.push_str(" | _degraded answer_");
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::session::Effort;
    use crate::research::synthesis::{Answer, Citation};
    use chrono::Utc;
    use uuid::Uuid;

    fn outcome(answer: Option<Answer>, status: SessionStatus) -> SessionOutcome {
        SessionOutcome {
            id: Uuid::new_v4(),
            question: "What is Rust?".into(),
            effort: Effort::Medium,
            rounds: 2,
            status,
            answer,
            evidence: Vec::new(),
            failures: Vec::new(),
            diagnostics: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_markdown_lists_sources() {
        let answer = Answer {
            text: "Rust is a language [1].".into(),
            citations: vec![
                Citation {
                    index: 1,
                    label: "rust-lang.org".into(),
                    title: "Rust".into(),
                    url: Some("https://www.rust-lang.org/".into()),
                },
                Citation {
                    index: 2,
                    label: "TXT: notes.txt".into(),
                    title: "notes.txt".into(),
                    url: None,
                },
            ],
            degraded: false,
        };
        let md = ReportGenerator::markdown(&outcome(Some(answer), SessionStatus::Sufficient));
        assert!(md.starts_with("# What is Rust?\n\nRust is a language [1].\n"));
        assert!(md.contains("1. [Rust](https://www.rust-lang.org/) (rust-lang.org)"));
        assert!(md.contains("2. TXT: notes.txt"));
        assert!(md.contains("**Status:** sufficient | **Effort:** medium | **Rounds:** 2"));
    }

    #[test]
    fn test_markdown_without_answer() {
        let md = ReportGenerator::markdown(&outcome(None, SessionStatus::Cancelled));
        assert!(md.contains("_No answer (cancelled)._"));
    }

    #[test]
    fn test_json_render() {
        let json =
            ReportGenerator::render(&outcome(None, SessionStatus::Failed), OutputFormat::Json)
                .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["effort"], "medium");
        assert!(value.get("answer").is_none());
    }
}
