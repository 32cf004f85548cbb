mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engram::agent::IngestKind;
use engram::config::EngramConfig;
use engram::privacy::PrivacyLevel;

#[derive(Parser)]
#[command(name = "engram", version, about = "Memory retrieval and decision core for a personal notes app")]
struct Cli {
    /// Config file (default: ~/.engram/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a piece of content as memory
    Ingest {
        /// transcription, note, health_data or user_interaction
        #[arg(long, default_value = "note")]
        kind: IngestKind,
        /// Source confidence in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        /// Extra metadata as a JSON object (importance, title, tags)
        #[arg(long)]
        metadata: Option<String>,
        content: String,
    },
    /// Retrieve memories relevant to a query
    Search {
        /// Redact the results to this privacy level
        #[arg(long)]
        privacy: Option<PrivacyLevel>,
        query: String,
    },
    /// Classify the privacy level of some text
    Classify {
        /// Also print the sanitized text
        #[arg(long)]
        sanitize: bool,
        text: String,
    },
    /// Promote or expire aged short-term memories
    Consolidate,
    /// Delete stale, unimportant short-term memories
    Cleanup {
        #[arg(long)]
        max_age_days: Option<u64>,
        #[arg(long)]
        importance_floor: Option<f64>,
    },
    /// Show record counts
    Stats,
    /// Run background consolidation and insight review until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngramConfig::load_from(path)?,
        None => EngramConfig::load()?,
    };

    // Log to stderr so command output on stdout stays clean.
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest {
            kind,
            confidence,
            metadata,
            content,
        } => cli::ingest::ingest(&config, kind, &content, confidence, metadata.as_deref()).await?,
        Command::Search { privacy, query } => cli::search::search(&config, &query, privacy).await?,
        Command::Classify { sanitize, text } => cli::classify::classify(&text, sanitize),
        Command::Consolidate => cli::maintenance::consolidate(&config).await?,
        Command::Cleanup {
            max_age_days,
            importance_floor,
        } => cli::maintenance::cleanup(&config, max_age_days, importance_floor).await?,
        Command::Stats => cli::stats::stats(&config).await?,
        Command::Run => cli::run::run(&config).await?,
    }

    Ok(())
}
