//! Single research run: build the orchestrator, stream progress, print the report.

use crate::progress;
use anyhow::Context;
use sleuth_core::research::{
    ChannelSink, DocumentSnippet, OutputFormat, ReportGenerator, ResearchRequest, TracingSink,
};
use sleuth_core::{Effort, Orchestrator, SessionStatus, SleuthConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct RunOptions {
    pub question: String,
    pub effort: Effort,
    pub documents: Vec<PathBuf>,
    pub format: OutputFormat,
    pub show_progress: bool,
}

async fn load_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<DocumentSnippet>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let doc = DocumentSnippet::from_text_file(path)
            .await
            .with_context(|| format!("failed to read document {}", path.display()))?;
        documents.push(doc);
    }
    Ok(documents)
}

pub async fn run(options: RunOptions, config: SleuthConfig) -> anyhow::Result<()> {
    let mut request = ResearchRequest::new(options.question, options.effort);
    for doc in load_documents(&options.documents).await? {
        request = request.with_document(doc);
    }

    let orchestrator = Orchestrator::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize research: {}", e))?;

    let (orchestrator, printer) = if options.show_progress {
        let (sink, rx) = ChannelSink::channel(64);
        let printer = tokio::spawn(progress::print_events(rx));
        (orchestrator.with_sink(Arc::new(sink)), Some(printer))
    } else {
        (orchestrator.with_sink(Arc::new(TracingSink)), None)
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling research");
                cancel.cancel();
            }
        })
    };

    let outcome = orchestrator.run(request, cancel).await;
    interrupt.abort();

    // Dropping the orchestrator closes the event channel so the printer drains and exits.
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let status = outcome.status;
    let has_answer = outcome.answer.is_some();
    let report = ReportGenerator::render(&outcome, options.format)?;
    println!("{report}");

    match status {
        SessionStatus::Failed => {
            let reason = outcome.into_result().err().map(|e| e.to_string());
            anyhow::bail!(reason.unwrap_or_else(|| "research failed".to_string()))
        }
        SessionStatus::Cancelled if !has_answer => anyhow::bail!("research cancelled"),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_documents_reads_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\nTides follow the moon.").unwrap();

        let docs = load_documents(std::slice::from_ref(&path)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].label, "notes.md");
        assert!(docs[0].text.contains("Tides follow the moon."));
    }

    #[tokio::test]
    async fn test_load_documents_missing_file() {
        let err = load_documents(&[PathBuf::from("/nonexistent/notes.txt")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/notes.txt"));
    }
}
