//! First stage of a cycle: what is being asked, and in what situation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::OrchestratorConfig;
use crate::memory::{MemoryContext, RecordKind};
use crate::privacy::PrivacyAnalysis;
use crate::retrieval::scoring::words;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Asking about something that happened.
    Recall,
    /// Asking for advice or an explanation.
    Seeking,
    /// Something to do or be reminded of.
    Task,
    /// Looking up stored content.
    Search,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recall => "recall",
            Self::Seeking => "seeking",
            Self::Task => "task",
            Self::Search => "search",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in this order; the first bucket with a hit wins.
const INTENT_BUCKETS: [(Intent, &[&str]); 4] = [
    (
        Intent::Recall,
        &["remember", "recall", "last time", "earlier", "did i", "when did", "what did"],
    ),
    (
        Intent::Task,
        &["remind", "reminder", "schedule", "todo", "to do", "task", "need to", "deadline", "plan"],
    ),
    (
        Intent::Search,
        &["find", "search", "look up", "show me", "where is", "list"],
    ),
    (
        Intent::Seeking,
        &["how", "why", "what", "explain", "recommend", "suggest", "should", "advice"],
    ),
];

pub fn classify_intent(query: &str) -> Intent {
    let tokens: Vec<String> = words(query).collect();
    let haystack = format!(" {} ", tokens.join(" "));
    INTENT_BUCKETS
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| haystack.contains(&format!(" {cue} "))))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

/// Record counts at the start of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub counts: HashMap<RecordKind, usize>,
    pub taken_at: DateTime<Utc>,
}

impl SystemSnapshot {
    pub fn new(counts: HashMap<RecordKind, usize>) -> Self {
        Self {
            counts,
            taken_at: Utc::now(),
        }
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Conditions that make autonomous work worth recommending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    ConsolidationBacklog { short_term: usize },
    EntityExtraction { words: usize, linked_entities: usize },
}

pub fn detect_triggers(
    query: &str,
    context: &MemoryContext,
    snapshot: &SystemSnapshot,
    config: &OrchestratorConfig,
) -> Vec<Trigger> {
    let mut triggers = Vec::new();

    let short_term = snapshot.count(RecordKind::ShortTerm);
    if short_term > config.stm_backlog_threshold {
        triggers.push(Trigger::ConsolidationBacklog { short_term });
    }

    let word_count = query.split_whitespace().count();
    let linked_entities = context.entities.len();
    if word_count >= config.long_query_words && linked_entities < 2 {
        triggers.push(Trigger::EntityExtraction {
            words: word_count,
            linked_entities,
        });
    }

    triggers
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Perception {
    pub query: String,
    pub context: MemoryContext,
    pub privacy: PrivacyAnalysis,
    pub snapshot: SystemSnapshot,
    pub intent: Intent,
    pub triggers: Vec<Trigger>,
}

impl Perception {
    pub fn has_trigger(&self, matches: impl Fn(&Trigger) -> bool) -> bool {
        self.triggers.iter().any(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_buckets() {
        assert_eq!(classify_intent("Remember when I met Ana?"), Intent::Recall);
        assert_eq!(classify_intent("what did I say yesterday"), Intent::Recall);
        assert_eq!(classify_intent("Remind me to call the bank"), Intent::Task);
        assert_eq!(classify_intent("find my notes on Rust"), Intent::Search);
        assert_eq!(classify_intent("How should I structure this?"), Intent::Seeking);
        assert_eq!(classify_intent("hello"), Intent::General);
        // whole words only
        assert_eq!(classify_intent("showcase the planet"), Intent::General);
    }

    fn snapshot(short_term: usize) -> SystemSnapshot {
        SystemSnapshot::new(HashMap::from([(RecordKind::ShortTerm, short_term)]))
    }

    #[test]
    fn backlog_trigger_is_strictly_above_threshold() {
        let config = OrchestratorConfig::default();
        let ctx = MemoryContext::empty("q");
        assert!(detect_triggers("q", &ctx, &snapshot(50), &config).is_empty());
        assert_eq!(
            detect_triggers("q", &ctx, &snapshot(51), &config),
            vec![Trigger::ConsolidationBacklog { short_term: 51 }]
        );
    }

    #[test]
    fn long_queries_without_entities_trigger_extraction() {
        let config = OrchestratorConfig::default();
        let ctx = MemoryContext::empty("q");
        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert_eq!(
            detect_triggers(long, &ctx, &snapshot(0), &config),
            vec![Trigger::EntityExtraction {
                words: 12,
                linked_entities: 0
            }]
        );
        assert!(detect_triggers("short query", &ctx, &snapshot(0), &config).is_empty());
    }
}
