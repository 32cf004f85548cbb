//! CLI maintenance commands: `consolidate` and `cleanup`.

use anyhow::Result;

use engram::agent::DecisionSource;
use engram::config::EngramConfig;

/// Run one consolidation sweep.
pub async fn consolidate(config: &EngramConfig) -> Result<()> {
    let agent = super::open_agent(config).await?;

    println!(
        "Consolidating short-term memories older than {}h...",
        config.agent.consolidation_age_hours
    );
    let report = agent.consolidate_now().await?;

    if report.examined == 0 {
        println!("  Nothing to consolidate.");
        return Ok(());
    }
    let decided_by = match report.decided_by {
        DecisionSource::Provider => "provider",
        DecisionSource::Heuristic => "heuristic",
    };
    println!(
        "  Examined {}: promoted {}, expired {} ({decided_by} decisions).",
        report.examined, report.promoted, report.expired
    );
    for failure in &report.failures {
        println!("  Skipped {}: {}", failure.id, failure.reason);
    }
    Ok(())
}

/// Delete stale, unimportant short-term memories.
pub async fn cleanup(config: &EngramConfig, max_age_days: Option<u64>, floor: Option<f64>) -> Result<()> {
    let agent = super::open_agent(config).await?;
    let max_age_days = max_age_days.unwrap_or(config.agent.cleanup_max_age_days);
    let floor = floor.unwrap_or(config.agent.cleanup_importance_floor);

    let deleted = agent.cleanup(max_age_days, floor).await?;
    agent.save().await?;
    println!(
        "Deleted {deleted} short-term memories older than {max_age_days} days with importance below {floor:.2}."
    );
    Ok(())
}
