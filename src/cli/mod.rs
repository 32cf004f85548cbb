pub mod classify;
pub mod ingest;
pub mod maintenance;
pub mod run;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use std::sync::Arc;

use engram::agent::Agent;
use engram::config::EngramConfig;
use engram::db::SqliteMemoryStore;

/// Open the configured database and return an initialized agent.
///
/// The binary ships without embedding or response providers, so retrieval
/// is keyword-only and consolidation uses the heuristic decision.
pub async fn open_agent(config: &EngramConfig) -> Result<Arc<Agent>> {
    let db_path = config.resolved_db_path();
    let store = SqliteMemoryStore::open(&db_path)
        .with_context(|| format!("failed to open memory store at {}", db_path.display()))?;

    let agent = Agent::new(Arc::new(store), None, None, config);
    agent.initialize().await?;
    Ok(Arc::new(agent))
}

/// First `max_chars` characters of `text` on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    engram::memory::types::summarize(&flat, max_chars)
}
