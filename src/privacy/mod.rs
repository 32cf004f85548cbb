//! Privacy classification and context redaction.
//!
//! [`PrivacyAnalyzer`] is pure and deterministic: it scores text against
//! fixed vocabularies (see [`terms`]), optionally adds weight from the
//! memories a query retrieved, and maps the result onto a four-tier
//! [`PrivacyLevel`]. [`PrivacyAnalyzer::filter_context`] strips a
//! [`MemoryContext`] down to what may be shown at a given level.

pub mod terms;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::memory::{MemoryContext, MemoryItem};
use crate::retrieval::scoring::words;

use terms::{tag_risk, TermCategory, CATEGORIES};

/// Sensitivity tier, ordered from least to most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    Contextual,
    Personal,
    Sensitive,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Contextual => "contextual",
            Self::Personal => "personal",
            Self::Sensitive => "sensitive",
        }
    }

    /// Band for a raw score: `[0, 0.2)` public, `[0.2, 0.5)` contextual,
    /// `[0.5, 0.8)` personal, anything above sensitive.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Sensitive
        } else if score >= 0.5 {
            Self::Personal
        } else if score >= 0.2 {
            Self::Contextual
        } else {
            Self::Public
        }
    }
}

impl std::fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "contextual" => Ok(Self::Contextual),
            "personal" => Ok(Self::Personal),
            "sensitive" => Ok(Self::Sensitive),
            _ => Err(format!("unknown privacy level: {s}")),
        }
    }
}

/// Category of data that forces a `sensitive` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskFactor {
    Health,
    Financial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivacyAnalysis {
    pub level: PrivacyLevel,
    pub score: f64,
    /// Pronouns, personal verbs and personal time references found.
    pub personal_indicators: Vec<String>,
    /// Family, location, health and financial terms found.
    pub sensitive_entities: Vec<String>,
    pub risk_factors: Vec<RiskFactor>,
    pub confidence: f64,
    pub requires_on_device: bool,
}

impl PrivacyAnalysis {
    pub fn has_risk(&self, risk: RiskFactor) -> bool {
        self.risk_factors.contains(&risk)
    }
}

/// Term hits of a single text, before any context is considered.
#[derive(Default)]
struct TextHits {
    score: f64,
    hits: usize,
    personal_indicators: Vec<String>,
    sensitive_entities: Vec<String>,
    risks: Vec<RiskFactor>,
}

impl TextHits {
    fn add_risk(&mut self, risk: RiskFactor) {
        if !self.risks.contains(&risk) {
            self.risks.push(risk);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyAnalyzer;

impl PrivacyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `text`, adding weight from the memories in `context`.
    pub fn analyze(&self, text: &str, context: Option<&MemoryContext>) -> PrivacyAnalysis {
        let mut hits = scan(text);

        if let Some(ctx) = context {
            let mut extra = 0.0;
            for stm in &ctx.short_term {
                let own = scan(&stm.content);
                extra += 0.2 * own.score;
                for risk in own.risks {
                    hits.add_risk(risk);
                }
                for risk in stm.context_tags.iter().filter_map(|t| tag_risk(t)) {
                    hits.add_risk(risk);
                }
            }
            for ltm in &ctx.long_term {
                let own = scan(&ltm.content);
                extra += 0.2 * own.score;
                for risk in own.risks {
                    hits.add_risk(risk);
                }
                for risk in ltm.related_concepts.iter().filter_map(|t| tag_risk(t)) {
                    hits.add_risk(risk);
                }
            }
            extra += 0.4 * ctx.episodic.len() as f64;
            extra += 0.05 * ctx.entities.len() as f64;
            hits.score += extra.min(1.0);
        }

        let level = if hits.risks.is_empty() {
            PrivacyLevel::from_score(hits.score)
        } else {
            PrivacyLevel::Sensitive
        };

        PrivacyAnalysis {
            level,
            score: hits.score,
            personal_indicators: hits.personal_indicators,
            sensitive_entities: hits.sensitive_entities,
            risk_factors: hits.risks,
            confidence: (0.5 + 0.05 * hits.hits as f64).min(0.95),
            requires_on_device: level >= PrivacyLevel::Personal,
        }
    }

    /// Level of a single text with no context.
    pub fn level_of(&self, text: &str) -> PrivacyLevel {
        self.analyze(text, None).level
    }

    fn below_sensitive(&self, item: &dyn MemoryItem) -> bool {
        self.level_of(&item.content()) < PrivacyLevel::Sensitive
    }

    /// Reduce `context` to what may be exposed at `target`.
    pub fn filter_context(&self, context: &MemoryContext, target: PrivacyLevel) -> MemoryContext {
        let mut filtered = context.clone();
        match target {
            PrivacyLevel::Sensitive => return filtered,
            PrivacyLevel::Personal => {
                filtered.short_term.retain(|m| self.below_sensitive(m));
                filtered.long_term.retain(|m| self.below_sensitive(m));
                filtered.notes.retain(|n| self.below_sensitive(n));
                filtered.entities.retain(|e| self.below_sensitive(e));
                filtered.episodic.clear();
            }
            PrivacyLevel::Contextual => {
                filtered
                    .entities
                    .retain(|e| self.level_of(&e.content()) == PrivacyLevel::Public);
                filtered.short_term.clear();
                filtered.long_term.clear();
                filtered.episodic.clear();
                filtered.notes.clear();
            }
            PrivacyLevel::Public => {
                filtered.short_term.clear();
                filtered.long_term.clear();
                filtered.episodic.clear();
                filtered.entities.clear();
                filtered.notes.clear();
                filtered.relationships.clear();
                filtered.scores.clear();
                filtered.contains_personal_data = false;
                filtered.user_query = self.sanitize_query(&context.user_query);
                return filtered;
            }
        }

        let kept: HashSet<String> = filtered
            .short_term
            .iter()
            .map(|m| m.id.clone())
            .chain(filtered.long_term.iter().map(|m| m.id.clone()))
            .chain(filtered.notes.iter().map(|n| n.id.clone()))
            .chain(filtered.entities.iter().map(|e| e.id.clone()))
            .collect();
        filtered
            .relationships
            .retain(|r| kept.contains(&r.subject_id) && kept.contains(&r.object_id));
        filtered.scores.retain(|id, _| kept.contains(id));
        filtered
    }

    /// Replace every redactable word or two-word phrase with its category
    /// placeholder. Punctuation and spacing are preserved.
    pub fn sanitize_query(&self, query: &str) -> String {
        let segments = segment(query);
        let mut out = String::with_capacity(query.len());
        let mut i = 0;

        while i < segments.len() {
            let (text, is_word) = segments[i];
            if !is_word {
                out.push_str(text);
                i += 1;
                continue;
            }

            // two-word phrase separated by plain whitespace
            if let (Some((gap, false)), Some((next, true))) =
                (segments.get(i + 1), segments.get(i + 2))
            {
                if gap.chars().all(char::is_whitespace) {
                    let phrase = format!("{} {}", text.to_lowercase(), next.to_lowercase());
                    if let Some(placeholder) = terms::placeholder_for(&phrase) {
                        out.push_str(placeholder);
                        i += 3;
                        continue;
                    }
                }
            }

            match terms::placeholder_for(&text.to_lowercase()) {
                Some(placeholder) => out.push_str(placeholder),
                None => out.push_str(text),
            }
            i += 1;
        }
        out
    }
}

/// Find every distinct term of every category in `text`.
fn scan(text: &str) -> TextHits {
    let tokens: Vec<String> = words(text).collect();
    let word_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let joined = format!(" {} ", tokens.join(" "));

    let mut hits = TextHits::default();
    for category in CATEGORIES {
        record_category(&mut hits, category, &word_set, &joined);
    }
    hits
}

fn record_category(
    hits: &mut TextHits,
    category: &TermCategory,
    word_set: &HashSet<&str>,
    joined: &str,
) {
    for term in category.terms {
        let present = if term.contains(' ') {
            joined.contains(&format!(" {term} "))
        } else {
            word_set.contains(term)
        };
        if !present {
            continue;
        }
        hits.score += category.weight;
        hits.hits += 1;
        if category.sensitive {
            hits.sensitive_entities.push(term.to_string());
        } else {
            hits.personal_indicators.push(term.to_string());
        }
        if let Some(risk) = category.risk {
            hits.add_risk(risk);
        }
    }
}

/// Split into alternating word / non-word runs, flagged `true` for words.
fn segment(text: &str) -> Vec<(&str, bool)> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let is_word = ch.is_alphanumeric();
        match current {
            Some(kind) if kind == is_word => {}
            Some(kind) => {
                segments.push((&text[start..idx], kind));
                start = idx;
                current = Some(is_word);
            }
            None => current = Some(is_word),
        }
    }
    if let Some(kind) = current {
        segments.push((&text[start..], kind));
    }
    segments
}
