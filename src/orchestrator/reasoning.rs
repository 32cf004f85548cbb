//! Second stage of a cycle: judge the response and decide on follow-up work.

use serde::Serialize;

use super::insights::Insight;
use super::perception::{Intent, Perception, Trigger};
use crate::agent::{ActionKind, AgentResponse};
use crate::config::OrchestratorConfig;
use crate::memory::RecordKind;

/// Characters at which a response counts as complete.
const COMPLETE_RESPONSE_CHARS: f64 = 400.0;
const RELEVANCE: f64 = 0.8;
const CLARITY: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityEstimate {
    pub confidence: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub clarity: f64,
    pub overall: f64,
}

impl QualityEstimate {
    pub fn estimate(response: &AgentResponse) -> Self {
        let confidence = response.confidence;
        let completeness = (response.content.chars().count() as f64 / COMPLETE_RESPONSE_CHARS).min(1.0);
        let overall = (confidence + completeness + RELEVANCE + CLARITY) / 4.0;
        Self {
            confidence,
            completeness,
            relevance: RELEVANCE,
            clarity: CLARITY,
            overall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: ActionKind,
    pub confidence: f64,
    pub reason: String,
}

impl Recommendation {
    fn new(kind: ActionKind, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            confidence,
            reason: reason.into(),
        }
    }
}

pub fn recommend(perception: &Perception, config: &OrchestratorConfig) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if perception.has_trigger(|t| matches!(t, Trigger::ConsolidationBacklog { .. })) {
        recommendations.push(Recommendation::new(
            ActionKind::Consolidation,
            0.9,
            "short-term memory backlog",
        ));
    }
    if perception.has_trigger(|t| matches!(t, Trigger::EntityExtraction { .. })) {
        recommendations.push(Recommendation::new(
            ActionKind::EntityExtraction,
            0.75,
            "long query with few known entities",
        ));
    }
    if perception.context.entities.len() >= 2 {
        recommendations.push(Recommendation::new(
            ActionKind::GraphUpdate,
            0.6,
            "several entities mentioned together",
        ));
    }
    if perception.intent == Intent::Task {
        recommendations.push(Recommendation::new(
            ActionKind::Notification,
            0.7,
            "query describes a task",
        ));
    }
    if perception.snapshot.count(RecordKind::ShortTerm) > 2 * config.stm_backlog_threshold {
        recommendations.push(Recommendation::new(
            ActionKind::Cleanup,
            0.85,
            "short-term memory far above backlog threshold",
        ));
    }

    recommendations
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reasoning {
    pub response: AgentResponse,
    pub quality: QualityEstimate,
    pub recommendations: Vec<Recommendation>,
    pub insights: Vec<Insight>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Entity, MemoryContext, SearchMode};
    use crate::orchestrator::perception::SystemSnapshot;
    use crate::privacy::{PrivacyAnalyzer, PrivacyLevel};
    use std::collections::HashMap;

    fn response(content: &str, confidence: f64) -> AgentResponse {
        AgentResponse {
            content: content.to_string(),
            confidence,
            processing_time_seconds: 0.0,
            autonomous_actions: Vec::new(),
            model_used: "test".into(),
            is_on_device: true,
            privacy_level: PrivacyLevel::Public,
            search_mode: SearchMode::Keyword,
        }
    }

    fn perception(query: &str, intent: Intent, short_term: usize, triggers: Vec<Trigger>) -> Perception {
        Perception {
            query: query.into(),
            context: MemoryContext::empty(query),
            privacy: PrivacyAnalyzer::new().analyze(query, None),
            snapshot: SystemSnapshot::new(HashMap::from([(RecordKind::ShortTerm, short_term)])),
            intent,
            triggers,
        }
    }

    #[test]
    fn quality_is_mean_of_components() {
        let q = QualityEstimate::estimate(&response(&"x".repeat(200), 0.9));
        assert_eq!(q.completeness, 0.5);
        assert!((q.overall - (0.9 + 0.5 + 0.8 + 0.85) / 4.0).abs() < 1e-12);

        let long = QualityEstimate::estimate(&response(&"x".repeat(1000), 0.9));
        assert_eq!(long.completeness, 1.0);
    }

    #[test]
    fn backlog_recommends_consolidation() {
        let p = perception(
            "test",
            Intent::General,
            51,
            vec![Trigger::ConsolidationBacklog { short_term: 51 }],
        );
        let recs = recommend(&p, &OrchestratorConfig::default());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, ActionKind::Consolidation);
        assert_eq!(recs[0].confidence, 0.9);
    }

    #[test]
    fn task_entities_and_huge_backlog() {
        let mut p = perception("remind me", Intent::Task, 101, Vec::new());
        p.context.entities = vec![Entity::new("Ana", "person"), Entity::new("Gym", "place")];
        let kinds: Vec<ActionKind> = recommend(&p, &OrchestratorConfig::default())
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ActionKind::GraphUpdate, ActionKind::Notification, ActionKind::Cleanup]
        );
    }
}
