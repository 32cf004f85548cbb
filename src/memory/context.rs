//! Query-scoped memory aggregate handed from retrieval to privacy and generation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{
    EpisodicMemory, Entity, LongTermMemory, MemoryItem, Note, Relationship, ShortTermMemory,
};

/// How a context was ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Keyword and recency only; semantic search was not requested or not configured.
    Keyword,
    /// Keyword and embedding similarity.
    Hybrid,
    /// Semantic search was requested but the query could not be embedded.
    KeywordFallback,
}

impl SearchMode {
    /// `true` when the result is a partial success.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::KeywordFallback)
    }
}

/// Everything retrieved for one query. Never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryContext {
    pub timestamp: DateTime<Utc>,
    pub user_query: String,
    pub contains_personal_data: bool,
    pub short_term: Vec<ShortTermMemory>,
    pub long_term: Vec<LongTermMemory>,
    pub episodic: Vec<EpisodicMemory>,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub notes: Vec<Note>,
    /// Ranking score per returned record id.
    pub scores: HashMap<String, f64>,
    pub search_mode: SearchMode,
}

impl MemoryContext {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_query: query.into(),
            contains_personal_data: false,
            short_term: Vec::new(),
            long_term: Vec::new(),
            episodic: Vec::new(),
            entities: Vec::new(),
            relationships: Vec::new(),
            notes: Vec::new(),
            scores: HashMap::new(),
            search_mode: SearchMode::Keyword,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0 && self.relationships.is_empty()
    }

    /// Number of memories, entities and notes (relationships excluded).
    pub fn total_items(&self) -> usize {
        self.short_term.len()
            + self.long_term.len()
            + self.episodic.len()
            + self.entities.len()
            + self.notes.len()
    }

    pub fn score_of(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    /// Render the context as prompt lines, stopping once the estimated token
    /// count (4 characters per token) would exceed `token_budget`.
    pub fn render(&self, token_budget: usize) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut tokens = 0usize;

        let mut push = |label: &str, text: &str| -> bool {
            let line = format!("[{label}] {}", text.trim());
            let cost = line.len() / 4 + 1;
            if tokens + cost > token_budget {
                return false;
            }
            tokens += cost;
            lines.push(line);
            true
        };

        let sections: [(&str, Vec<&dyn MemoryItem>); 5] = [
            ("recent", self.short_term.iter().map(|m| m as &dyn MemoryItem).collect()),
            ("known", self.long_term.iter().map(|m| m as &dyn MemoryItem).collect()),
            ("event", self.episodic.iter().map(|m| m as &dyn MemoryItem).collect()),
            ("entity", self.entities.iter().map(|m| m as &dyn MemoryItem).collect()),
            ("note", self.notes.iter().map(|m| m as &dyn MemoryItem).collect()),
        ];

        'outer: for (label, items) in sections.iter() {
            for item in items {
                if !push(label, &item.content()) {
                    break 'outer;
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryType;

    #[test]
    fn empty_context_is_empty() {
        let ctx = MemoryContext::empty("hello");
        assert!(ctx.is_empty());
        assert_eq!(ctx.total_items(), 0);
        assert_eq!(ctx.user_query, "hello");
        assert!(!ctx.search_mode.is_degraded());
    }

    #[test]
    fn render_respects_token_budget() {
        let mut ctx = MemoryContext::empty("q");
        for i in 0..20 {
            ctx.short_term.push(ShortTermMemory::new(
                format!("memory number {i} with some padding text"),
                MemoryType::Semantic,
                0.5,
            ));
        }
        let full = ctx.render(10_000);
        assert_eq!(full.lines().count(), 20);

        let small = ctx.render(30);
        assert!(small.lines().count() < 20);
        assert!(small.len() / 4 <= 30);
    }
}
