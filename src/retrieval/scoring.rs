//! Pure ranking functions used by the retrieval engine.

use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::memory::types::{age_in_days, Embedding, RecordKind};
use crate::privacy::terms::PRONOUNS;

/// Lower-cased words of `text`, split on anything that is not alphanumeric.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Query terms: words longer than two characters, de-duplicated in first-seen order.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words(query) {
        if word.chars().count() > 2 && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Whether the query uses a first-person pronoun.
pub fn contains_personal_markers(query: &str) -> bool {
    words(query).any(|w| PRONOUNS.terms.contains(&w.as_str()))
}

/// Exact word matches count double, substring-only matches count once,
/// normalized so a text matching every term as a whole word scores `1.0`.
pub fn keyword_score(terms: &[String], content: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let lowered = content.to_lowercase();
    let content_words: Vec<String> = words(&lowered).collect();

    let points: usize = terms
        .iter()
        .map(|term| {
            if content_words.iter().any(|w| w == term) {
                2
            } else if lowered.contains(term.as_str()) {
                1
            } else {
                0
            }
        })
        .sum();

    points as f64 / (2 * terms.len()) as f64
}

/// Days after which an item of this kind stops earning recency credit.
pub fn recency_window_days(kind: RecordKind) -> f64 {
    match kind {
        RecordKind::Episodic => 60.0,
        _ => 30.0,
    }
}

/// Linear decay from `1.0` (now) to `0.0` at the end of the window.
pub fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>, window_days: f64) -> f64 {
    (1.0 - age_in_days(timestamp, now) / window_days).max(0.0)
}

/// Similarity between the query vector and an item embedding. Missing,
/// stale and dimension-mismatched embeddings score `0.0`.
pub fn semantic_score(
    query: &[f32],
    embedding: Option<&Embedding>,
    now: DateTime<Utc>,
    max_age_days: u64,
) -> f64 {
    match embedding {
        Some(e) if e.age_days(now) <= max_age_days as f64 && e.vector.len() == query.len() => {
            cosine_similarity(query, &e.vector).max(0.0)
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn tokenize_drops_short_words_and_duplicates() {
        assert_eq!(
            tokenize("What did I say to Ana about the trip? The TRIP!"),
            vec!["what", "did", "say", "ana", "about", "the", "trip"]
        );
        assert!(tokenize("a an to").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn personal_markers_are_whole_words() {
        assert!(contains_personal_markers("Where did I park?"));
        assert!(contains_personal_markers("our plans"));
        assert!(!contains_personal_markers("mystery museum"));
    }

    #[test]
    fn keyword_score_weights_exact_matches() {
        let terms = tokenize("climbing gym");
        assert_eq!(keyword_score(&terms, "Went to the climbing gym"), 1.0);
        // "gym" only as a substring of "gymnastics"
        assert_eq!(keyword_score(&terms, "climbing and gymnastics"), 0.75);
        assert_eq!(keyword_score(&terms, "nothing relevant"), 0.0);
        assert_eq!(keyword_score(&[], "anything"), 0.0);
    }

    #[test]
    fn recency_decays_linearly_to_zero() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now, 30.0), 1.0);
        let half = recency_score(now - Duration::days(15), now, 30.0);
        assert!((half - 0.5).abs() < 1e-9);
        assert_eq!(recency_score(now - Duration::days(90), now, 30.0), 0.0);
        assert_eq!(recency_window_days(RecordKind::Episodic), 60.0);
    }

    #[test]
    fn semantic_score_ignores_unusable_embeddings() {
        let now = Utc::now();
        let query = vec![1.0, 0.0];
        let fresh = Embedding {
            vector: vec![1.0, 0.0],
            generated_at: now,
        };
        let stale = Embedding {
            vector: vec![1.0, 0.0],
            generated_at: now - Duration::days(200),
        };
        let mismatched = Embedding {
            vector: vec![1.0, 0.0, 0.0],
            generated_at: now,
        };
        assert!((semantic_score(&query, Some(&fresh), now, 90) - 1.0).abs() < 1e-9);
        assert_eq!(semantic_score(&query, Some(&stale), now, 90), 0.0);
        assert_eq!(semantic_score(&query, Some(&mismatched), now, 90), 0.0);
        assert_eq!(semantic_score(&query, None, now, 90), 0.0);
    }
}
