//! Third stage of a cycle: run recommended follow-up work.

use serde::Serialize;
use tracing::{info, warn};

use super::perception::Perception;
use super::reasoning::Recommendation;
use crate::agent::{ActionKind, Agent, AutonomousAction};
use crate::error::AgentError;
use crate::memory::types::summarize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub delivered: bool,
    pub executed: Vec<AutonomousAction>,
    /// Recommendations below the confidence threshold.
    pub skipped: Vec<Recommendation>,
}

impl ActionReport {
    pub fn failures(&self) -> usize {
        self.executed.iter().filter(|a| !a.success).count()
    }
}

/// Run one recommendation. Failures are reported in the returned record,
/// never propagated.
pub async fn execute(
    agent: &Agent,
    recommendation: &Recommendation,
    perception: &Perception,
) -> AutonomousAction {
    let result = run(agent, recommendation.kind, perception).await;
    let (success, detail) = match result {
        Ok(detail) => (true, detail),
        Err(e) => {
            warn!(action = recommendation.kind.as_str(), error = %e, "autonomous action failed");
            (false, e.to_string())
        }
    };
    info!(
        action = recommendation.kind.as_str(),
        confidence = recommendation.confidence,
        success,
        "autonomous action executed"
    );
    AutonomousAction {
        kind: recommendation.kind,
        confidence: recommendation.confidence,
        success,
        detail,
    }
}

async fn run(agent: &Agent, kind: ActionKind, perception: &Perception) -> Result<String, AgentError> {
    match kind {
        ActionKind::Consolidation => {
            let report = agent.consolidate_now().await?;
            Ok(format!(
                "examined {}, promoted {}, expired {}, failed {}",
                report.examined,
                report.promoted,
                report.expired,
                report.failures.len()
            ))
        }
        ActionKind::EntityExtraction => {
            let entities = agent.extract_entities(&perception.query).await?;
            Ok(format!("{} entities extracted", entities.len()))
        }
        ActionKind::GraphUpdate => {
            let ids: Vec<String> = perception.context.entities.iter().map(|e| e.id.clone()).collect();
            let created = agent.update_graph(&ids).await?;
            Ok(format!("{created} relationships created"))
        }
        ActionKind::Notification => {
            agent.record_task(&perception.query).await?;
            Ok(format!("Task noted: {}", summarize(&perception.query, 80)))
        }
        ActionKind::Cleanup => {
            let config = agent.config();
            let deleted = agent
                .cleanup(config.cleanup_max_age_days, config.cleanup_importance_floor)
                .await?;
            Ok(format!("{deleted} stale short-term memories deleted"))
        }
    }
}
