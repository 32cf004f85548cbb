use anyhow::{Context, Result};

use engram::agent::IngestKind;
use engram::config::EngramConfig;

/// Ingest one piece of content from the terminal.
pub async fn ingest(
    config: &EngramConfig,
    kind: IngestKind,
    content: &str,
    confidence: f64,
    metadata: Option<&str>,
) -> Result<()> {
    let metadata = match metadata {
        Some(raw) => match serde_json::from_str::<serde_json::Value>(raw)
            .context("metadata must be a JSON object")?
        {
            serde_json::Value::Object(map) => map,
            _ => anyhow::bail!("metadata must be a JSON object"),
        },
        None => serde_json::Map::new(),
    };

    let agent = super::open_agent(config).await?;
    let outcome = agent.ingest(kind, content, confidence, &metadata).await?;
    agent.save().await?;

    println!(
        "Stored {} as {} (importance {:.2})",
        outcome.memory_id, outcome.stored_as, outcome.importance
    );
    if !outcome.linked_entity_ids.is_empty() {
        println!("  Linked entities: {}", outcome.linked_entity_ids.join(", "));
    }
    if let Some(note_id) = &outcome.note_id {
        println!("  Note: {note_id}");
    }
    if let Some(episodic_id) = &outcome.episodic_id {
        println!("  Episode: {episodic_id}");
    }
    Ok(())
}
