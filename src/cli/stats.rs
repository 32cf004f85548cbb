use anyhow::Result;

use engram::config::EngramConfig;
use engram::memory::RecordKind;

/// Display record counts in the terminal.
pub async fn stats(config: &EngramConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let agent = super::open_agent(config).await?;
    let counts = agent.counts().await?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    for kind in RecordKind::ALL {
        let count = counts.get(&kind).copied().unwrap_or(0);
        println!("  {:<14} {}", kind, count);
    }
    println!();

    let backlog = counts.get(&RecordKind::ShortTerm).copied().unwrap_or(0);
    if backlog > config.orchestrator.stm_backlog_threshold {
        println!(
            "Consolidation backlog: {backlog} short-term memories (threshold {})",
            config.orchestrator.stm_backlog_threshold
        );
    }

    let size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    println!("Database:              {}", db_path.display());
    println!("Database size:         {size} bytes");
    Ok(())
}
