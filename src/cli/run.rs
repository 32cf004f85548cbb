use anyhow::Result;
use std::sync::Arc;

use engram::config::EngramConfig;
use engram::orchestrator::{Orchestrator, OrchestratorEvent};
use tracing::info;

/// Run the orchestrator's background schedule until Ctrl-C.
pub async fn run(config: &EngramConfig) -> Result<()> {
    let agent = super::open_agent(config).await?;
    let orchestrator = Arc::new(Orchestrator::new(agent, config));
    let mut events = orchestrator.subscribe_events();

    orchestrator.start().await?;
    println!("Engram running. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(OrchestratorEvent::InsightsUpdated { .. }) => {
                    for insight in orchestrator.insights() {
                        println!("[insight] {}", insight.message);
                    }
                }
                Ok(OrchestratorEvent::Notification { message }) => println!("[task] {message}"),
                Ok(event) => info!(?event, "orchestrator event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    info!(skipped, "event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    orchestrator.stop().await;
    Ok(())
}
