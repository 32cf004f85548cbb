//! Candidate fetching and hybrid keyword/semantic ranking.
//!
//! [`RetrievalEngine::retrieve`] fetches candidates for every included
//! record kind concurrently, scores them, keeps the best of each kind up to
//! its cap and assembles a [`MemoryContext`].

pub mod scoring;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::AgentError;
use crate::memory::store::MAX_PREDICATE_TERMS;
use crate::memory::{
    FetchRequest, Filter, MemoryContext, MemoryItem, MemoryRecord, MemoryStore, RecordKind,
    SearchMode, Sort,
};

use scoring::{
    contains_personal_markers, keyword_score, recency_score, recency_window_days, semantic_score,
    tokenize,
};

/// Broad fetches pull this many times the usual candidate count so that
/// in-memory filtering still has enough matches to rank.
const BROAD_FETCH_FACTOR: usize = 4;

pub struct RetrievalEngine {
    store: Arc<dyn MemoryStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

/// A ranked candidate.
struct Scored {
    record: MemoryRecord,
    score: f64,
    timestamp: DateTime<Utc>,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn MemoryStore>, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { store, embedder }
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Retrieve and rank memories for `query`.
    ///
    /// An empty store or a query without usable terms yields an empty
    /// context. A failed query embedding degrades to keyword ranking
    /// ([`SearchMode::KeywordFallback`]); a failed store fetch is an error.
    pub async fn retrieve(
        &self,
        query: &str,
        config: &RetrievalConfig,
    ) -> Result<MemoryContext, AgentError> {
        let mut context = MemoryContext::empty(query);
        context.contains_personal_data = contains_personal_markers(query);

        let terms = tokenize(query);
        if terms.is_empty() || config.max_results == 0 {
            debug!(query, "no searchable terms");
            return Ok(context);
        }

        let (query_vector, search_mode) = self.embed_query(query, config).await;
        context.search_mode = search_mode;

        let (short_term, long_term, episodic, entities, notes) = tokio::try_join!(
            self.candidates(RecordKind::ShortTerm, &terms, config),
            self.candidates(RecordKind::LongTerm, &terms, config),
            self.candidates(RecordKind::Episodic, &terms, config),
            self.candidates(RecordKind::Entity, &terms, config),
            self.candidates(RecordKind::Note, &terms, config),
        )
        .map_err(AgentError::retrieval)?;

        let now = Utc::now();
        for (kind, records) in [
            (RecordKind::ShortTerm, short_term),
            (RecordKind::LongTerm, long_term),
            (RecordKind::Episodic, episodic),
            (RecordKind::Entity, entities),
            (RecordKind::Note, notes),
        ] {
            let ranked = rank(records, &terms, query_vector.as_deref(), config, now);
            for scored in ranked.into_iter().take(config.type_cap(kind)) {
                context.scores.insert(scored.record.id().to_string(), scored.score);
                place(&mut context, scored.record);
            }
        }

        if !context.entities.is_empty() {
            let ids: Vec<String> = context.entities.iter().map(|e| e.id.clone()).collect();
            let request = FetchRequest::new(RecordKind::Relationship)
                .filter(Filter::InvolvesEntities(ids));
            let records = self.store.fetch(request).await.map_err(AgentError::retrieval)?;
            context.relationships = records
                .into_iter()
                .filter_map(|r| match r {
                    MemoryRecord::Relationship(rel) => Some(rel),
                    _ => None,
                })
                .collect();
        }

        self.track_access(&context).await;

        debug!(
            query,
            items = context.total_items(),
            mode = ?context.search_mode,
            "retrieval complete"
        );
        Ok(context)
    }

    async fn embed_query(
        &self,
        query: &str,
        config: &RetrievalConfig,
    ) -> (Option<Vec<f32>>, SearchMode) {
        let embedder = match (&self.embedder, config.enable_semantic_search) {
            (Some(embedder), true) => embedder,
            _ => return (None, SearchMode::Keyword),
        };
        match embedder.embed(query).await {
            Ok(vector) => (Some(vector), SearchMode::Hybrid),
            Err(e) => {
                warn!(error = %e, "query embedding failed, falling back to keyword search");
                (None, SearchMode::KeywordFallback)
            }
        }
    }

    /// Unranked candidates of one kind matching at least one term.
    async fn candidates(
        &self,
        kind: RecordKind,
        terms: &[String],
        config: &RetrievalConfig,
    ) -> Result<Vec<MemoryRecord>> {
        if !config.includes(kind) {
            return Ok(Vec::new());
        }
        let limit = (config.max_results * config.candidate_multiplier).max(1);

        if terms.len() <= MAX_PREDICATE_TERMS {
            let request = FetchRequest::new(kind)
                .filter(Filter::ContainsAny(terms.to_vec()))
                .sort(Sort::NewestFirst)
                .limit(limit);
            return self.store.fetch(request).await;
        }

        let request = FetchRequest::new(kind)
            .sort(Sort::NewestFirst)
            .limit(limit * BROAD_FETCH_FACTOR);
        let records = self.store.fetch(request).await?;
        Ok(records
            .into_iter()
            .filter(|record| {
                let content = record.as_item().search_text().to_lowercase();
                terms.iter().any(|t| content.contains(t.as_str()))
            })
            .collect())
    }

    async fn track_access(&self, context: &MemoryContext) {
        let stm_ids: Vec<String> = context.short_term.iter().map(|m| m.id.clone()).collect();
        let ltm_ids: Vec<String> = context.long_term.iter().map(|m| m.id.clone()).collect();

        for (kind, ids) in [(RecordKind::ShortTerm, stm_ids), (RecordKind::LongTerm, ltm_ids)] {
            if ids.is_empty() {
                continue;
            }
            if let Err(e) = self.store.touch(kind, &ids).await {
                warn!(kind = %kind, error = %e, "failed to record memory access");
            }
        }
    }
}

/// Score, filter by the active threshold and sort best first (ties: newest first).
fn rank(
    records: Vec<MemoryRecord>,
    terms: &[String],
    query_vector: Option<&[f32]>,
    config: &RetrievalConfig,
    now: DateTime<Utc>,
) -> Vec<Scored> {
    let threshold = if query_vector.is_some() {
        config.semantic_similarity_threshold
    } else {
        config.relevance_threshold
    };

    let mut scored: Vec<Scored> = records
        .into_iter()
        .filter_map(|record| {
            let item = record.as_item();
            let keyword = keyword_score(terms, &item.content());
            let timestamp = item.timestamp();
            let score = match query_vector {
                Some(query) => {
                    let semantic = semantic_score(
                        query,
                        item.embedding(),
                        now,
                        config.embedding_max_age_days,
                    );
                    config.keyword_weight * keyword + config.semantic_weight * semantic
                }
                None => {
                    let window = recency_window_days(record.kind());
                    config.relevance_weight * keyword
                        + config.recency_weight * recency_score(timestamp, now, window)
                }
            };
            (score >= threshold).then_some(Scored {
                record,
                score,
                timestamp,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    scored
}

fn place(context: &mut MemoryContext, record: MemoryRecord) {
    match record {
        MemoryRecord::ShortTerm(m) => context.short_term.push(m),
        MemoryRecord::LongTerm(m) => context.long_term.push(m),
        MemoryRecord::Episodic(m) => context.episodic.push(m),
        MemoryRecord::Entity(e) => context.entities.push(e),
        MemoryRecord::Note(n) => context.notes.push(n),
        MemoryRecord::Relationship(_) | MemoryRecord::Interaction(_) => {}
    }
}
