use anyhow::Result;

use engram::config::EngramConfig;
use engram::memory::{MemoryContext, MemoryItem};
use engram::privacy::PrivacyLevel;

/// Run a retrieval from the terminal, optionally redacted to a privacy level.
pub async fn search(config: &EngramConfig, query: &str, level: Option<PrivacyLevel>) -> Result<()> {
    let agent = super::open_agent(config).await?;
    let context = agent.retrieve(query).await?;
    let analysis = agent.analyze_privacy(query, Some(&context));

    let context = match level {
        Some(level) => agent.privacy().filter_context(&context, level),
        None => context,
    };

    println!(
        "Query privacy: {} (score {:.2}, confidence {:.2})",
        analysis.level, analysis.score, analysis.confidence
    );
    if level.is_some() {
        println!("Shown as: {}", context.user_query);
    }

    if context.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} item(s)\n", context.total_items());
    print_section("short-term", &context, context.short_term.iter().map(|m| m as &dyn MemoryItem));
    print_section("long-term", &context, context.long_term.iter().map(|m| m as &dyn MemoryItem));
    print_section("episodic", &context, context.episodic.iter().map(|m| m as &dyn MemoryItem));
    print_section("entities", &context, context.entities.iter().map(|m| m as &dyn MemoryItem));
    print_section("notes", &context, context.notes.iter().map(|m| m as &dyn MemoryItem));

    if !context.relationships.is_empty() {
        println!("relationships:");
        for rel in &context.relationships {
            println!("  {} -[{}]-> {}", rel.subject_id, rel.predicate, rel.object_id);
        }
    }
    Ok(())
}

fn print_section<'a>(
    label: &str,
    context: &MemoryContext,
    items: impl Iterator<Item = &'a dyn MemoryItem>,
) {
    let mut items = items.peekable();
    if items.peek().is_none() {
        return;
    }
    println!("{label}:");
    for (i, item) in items.enumerate() {
        println!(
            "  {}. {} (score: {:.3})",
            i + 1,
            item.id(),
            context.score_of(item.id()).unwrap_or_default()
        );
        println!("     {}", super::preview(&item.content(), 120));
    }
    println!();
}
