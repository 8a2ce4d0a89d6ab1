//! Sleuth CLI: terminal front-end for the Sleuth research assistant.
//!
//! Submits one research question, streams progress while the session runs,
//! and prints the cited answer.

mod commands;
mod progress;
mod research;

use clap::Parser;
use sleuth_core::Effort;
use sleuth_core::research::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Sleuth: iterative, citation-grounded web research
#[derive(Parser, Debug)]
#[command(name = "sleuth", version, about, long_about = None)]
struct Cli {
    /// Question to research
    question: Option<String>,

    /// Research effort: low, medium, high
    #[arg(short, long, default_value = "medium")]
    effort: Effort,

    /// Plain-text document to seed as evidence (repeatable)
    #[arg(short, long = "doc")]
    docs: Vec<PathBuf>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Print the full session outcome as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    /// Answer from already-gathered sources when interrupted
    #[arg(long)]
    finalize_on_cancel: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

fn init_tracing(verbose: u8, quiet: bool, json: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet, cli.log_json);

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if let Some(command) = cli.command {
        return commands::handle_command(command, &workspace, cli.config.as_deref()).await;
    }

    let Some(question) = cli.question.filter(|q| !q.trim().is_empty()) else {
        anyhow::bail!("a question is required, e.g. `sleuth \"How do tides work?\"`");
    };

    let mut config =
        sleuth_core::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if cli.finalize_on_cancel {
        config.research.finalize_on_cancel = true;
    }

    let options = research::RunOptions {
        question,
        effort: cli.effort,
        documents: cli.docs,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Markdown
        },
        show_progress: !cli.quiet,
    };
    research::run(options, config).await
}
