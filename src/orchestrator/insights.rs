//! Proactive insights: short observations surfaced without being asked.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::perception::{Intent, Perception, SystemSnapshot, Trigger};
use super::CycleRecord;
use crate::memory::types::new_id;
use crate::memory::RecordKind;
use crate::retrieval::scoring::tokenize;

/// Queries a term must appear in before it counts as a recurring topic.
const FREQUENT_TOPIC_MIN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    ConsolidationBacklog,
    KnowledgeGap,
    FrequentTopic,
    UnlinkedEntities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub id: String,
    pub kind: InsightKind,
    pub message: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    pub fn new(kind: InsightKind, message: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: new_id(),
            kind,
            message: message.into(),
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// Insights suggested by a single cycle.
pub fn from_perception(perception: &Perception) -> Vec<Insight> {
    let mut insights = Vec::new();

    if perception.intent == Intent::Recall && perception.context.total_items() == 0 {
        insights.push(Insight::new(
            InsightKind::KnowledgeGap,
            format!("Nothing is remembered about \"{}\" yet", perception.query.trim()),
            0.6,
        ));
    }

    for trigger in &perception.triggers {
        if let Trigger::ConsolidationBacklog { short_term } = trigger {
            insights.push(backlog_insight(*short_term));
        }
    }
    insights
}

/// Insights from the periodic review of counts and recent cycles.
pub fn periodic(
    snapshot: &SystemSnapshot,
    history: &VecDeque<CycleRecord>,
    backlog_threshold: usize,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    let short_term = snapshot.count(RecordKind::ShortTerm);
    if short_term > backlog_threshold {
        insights.push(backlog_insight(short_term));
    }

    let entities = snapshot.count(RecordKind::Entity);
    if entities >= 2 && snapshot.count(RecordKind::Relationship) == 0 {
        insights.push(Insight::new(
            InsightKind::UnlinkedEntities,
            format!("{entities} entities are known but none are linked"),
            0.5,
        ));
    }

    if let Some((topic, count)) = frequent_topic(history) {
        insights.push(Insight::new(
            InsightKind::FrequentTopic,
            format!("\"{topic}\" came up in {count} recent questions"),
            0.7,
        ));
    }
    insights
}

fn backlog_insight(short_term: usize) -> Insight {
    Insight::new(
        InsightKind::ConsolidationBacklog,
        format!("{short_term} short-term memories are waiting for consolidation"),
        0.8,
    )
}

/// Most frequent query term across the history, counted once per query.
fn frequent_topic(history: &VecDeque<CycleRecord>) -> Option<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in history {
        for term in tokenize(&record.query) {
            *counts.entry(term).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n >= FREQUENT_TOPIC_MIN)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
}

/// Bounded rolling list, newest first. An insight with the same kind and
/// message as an existing one replaces it.
#[derive(Debug, Clone)]
pub struct InsightLog {
    max: usize,
    items: VecDeque<Insight>,
}

impl InsightLog {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            items: VecDeque::new(),
        }
    }

    pub fn merge(&mut self, insights: Vec<Insight>) {
        for insight in insights {
            self.items
                .retain(|i| !(i.kind == insight.kind && i.message == insight.message));
            self.items.push_front(insight);
        }
        self.items.truncate(self.max);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Insight> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded_and_newest_first() {
        let mut log = InsightLog::new(2);
        log.merge(vec![
            Insight::new(InsightKind::FrequentTopic, "a", 0.5),
            Insight::new(InsightKind::FrequentTopic, "b", 0.5),
            Insight::new(InsightKind::FrequentTopic, "c", 0.5),
        ]);
        let messages: Vec<String> = log.to_vec().into_iter().map(|i| i.message).collect();
        assert_eq!(messages, vec!["c", "b"]);
    }

    #[test]
    fn duplicates_replace_older_entries() {
        let mut log = InsightLog::new(10);
        log.merge(vec![Insight::new(InsightKind::KnowledgeGap, "same", 0.5)]);
        log.merge(vec![Insight::new(InsightKind::UnlinkedEntities, "other", 0.5)]);
        log.merge(vec![Insight::new(InsightKind::KnowledgeGap, "same", 0.9)]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.to_vec()[0].confidence, 0.9);
    }

    #[test]
    fn periodic_flags_backlog_and_unlinked_entities() {
        let snapshot = SystemSnapshot::new(HashMap::from([
            (RecordKind::ShortTerm, 60),
            (RecordKind::Entity, 4),
            (RecordKind::Relationship, 0),
        ]));
        let kinds: Vec<InsightKind> = periodic(&snapshot, &VecDeque::new(), 50)
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![InsightKind::ConsolidationBacklog, InsightKind::UnlinkedEntities]
        );
    }
}
