//! Live progress lines for the research event stream.

use sleuth_core::ResearchEvent;
use sleuth_core::research::Verdict;
use tokio::sync::mpsc;

/// One human-readable line per event.
pub fn describe(event: &ResearchEvent) -> String {
    match event {
        ResearchEvent::QueriesGenerated { round, queries, .. } => {
            let list = queries
                .iter()
                .map(|q| format!("\"{q}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[round {}] searching: {}", round + 1, list)
        }
        ResearchEvent::EvidenceGathered {
            round,
            count,
            total,
            distinct_labels,
            failures,
        } => {
            let mut line = format!(
                "[round {}] {} results from {} sources ({} in store)",
                round + 1,
                count,
                distinct_labels.len(),
                total
            );
            if *failures > 0 {
                line.push_str(&format!(", {failures} failed"));
            }
            line
        }
        ResearchEvent::Reflected { round, verdict } => match verdict {
            Verdict::Sufficient => format!("[round {}] evidence is sufficient", round + 1),
            Verdict::Insufficient { gaps, .. } if gaps.is_empty() => {
                format!("[round {}] more evidence needed", round + 1)
            }
            Verdict::Insufficient { gaps, .. } => {
                format!("[round {}] gaps: {}", round + 1, gaps.join("; "))
            }
        },
        ResearchEvent::Diagnostic { stage, message } => format!("[{stage}] {message}"),
        ResearchEvent::Finalized { status, citations } => {
            format!("finished: {status}, {citations} citations")
        }
    }
}

/// Print events to stderr until the sender side is dropped.
pub async fn print_events(mut rx: mpsc::Receiver<ResearchEvent>) {
    while let Some(event) = rx.recv().await {
        eprintln!("  {}", describe(&event));
    }
}
