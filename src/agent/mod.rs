//! The memory agent: ingestion, query answering and memory upkeep.
//!
//! An [`Agent`] owns the retrieval engine, the privacy analyzer and the
//! consolidation engine, and wires them to an injected [`MemoryStore`],
//! optional [`EmbeddingProvider`] and optional [`ResponseProvider`].
//! Every operation except [`Agent::initialize`] fails with
//! [`AgentError::NotInitialized`] until startup has completed.

pub mod consolidation;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, EngramConfig, RetrievalConfig, MAX_AGE_DAYS};
use crate::embedding::EmbeddingProvider;
use crate::error::AgentError;
use crate::memory::store::fetch_as;
use crate::memory::types::{summarize, Embedding};
use crate::memory::{
    Entity, EpisodicMemory, FetchRequest, Filter, InteractionRecord, LongTermMemory,
    MemoryContext, MemoryStore, MemoryType, Mutation, Note, RecordKind, Relationship,
    SearchMode, ShortTermMemory, Sort,
};
use crate::privacy::{PrivacyAnalysis, PrivacyAnalyzer, PrivacyLevel};
use crate::provider::ResponseProvider;
use crate::retrieval::scoring::{tokenize, words};
use crate::retrieval::RetrievalEngine;

pub use consolidation::{ConsolidationEngine, ConsolidationReport, DecisionSource};

/// Predicate used for relationships created by [`Agent::update_graph`].
pub const CO_MENTIONED: &str = "co_mentioned";

/// What kind of content is being ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestKind {
    Transcription,
    Note,
    HealthData,
    UserInteraction,
}

impl IngestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Note => "note",
            Self::HealthData => "health_data",
            Self::UserInteraction => "user_interaction",
        }
    }

    /// Importance before scaling by confidence.
    pub fn base_importance(&self) -> f64 {
        match self {
            Self::Transcription => 0.6,
            Self::Note => 0.7,
            Self::HealthData => 0.8,
            Self::UserInteraction => 0.5,
        }
    }

    fn memory_type(&self) -> MemoryType {
        match self {
            Self::Transcription | Self::UserInteraction => MemoryType::Episodic,
            Self::Note | Self::HealthData => MemoryType::Semantic,
        }
    }
}

impl std::fmt::Display for IngestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IngestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcription" => Ok(Self::Transcription),
            "note" => Ok(Self::Note),
            "health_data" => Ok(Self::HealthData),
            "user_interaction" => Ok(Self::UserInteraction),
            _ => Err(format!("unknown ingest kind: {s}")),
        }
    }
}

/// Where ingested content ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub memory_id: String,
    /// `ShortTerm` or `LongTerm`.
    pub stored_as: RecordKind,
    pub importance: f64,
    pub linked_entity_ids: Vec<String>,
    pub note_id: Option<String>,
    pub episodic_id: Option<String>,
    pub embedded: bool,
}

/// Follow-up work the orchestrator may run without being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Consolidation,
    EntityExtraction,
    GraphUpdate,
    Notification,
    Cleanup,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consolidation => "consolidation",
            Self::EntityExtraction => "entity_extraction",
            Self::GraphUpdate => "graph_update",
            Self::Notification => "notification",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Outcome of one executed autonomous action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutonomousAction {
    pub kind: ActionKind,
    pub confidence: f64,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub content: String,
    pub confidence: f64,
    pub processing_time_seconds: f64,
    pub autonomous_actions: Vec<AutonomousAction>,
    pub model_used: String,
    pub is_on_device: bool,
    pub privacy_level: PrivacyLevel,
    pub search_mode: SearchMode,
}

pub struct Agent {
    store: Arc<dyn MemoryStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    provider: Option<Arc<dyn ResponseProvider>>,
    retrieval: RetrievalEngine,
    privacy: PrivacyAnalyzer,
    consolidation: ConsolidationEngine,
    config: AgentConfig,
    retrieval_config: RetrievalConfig,
    initialized: AtomicBool,
}

impl Agent {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        provider: Option<Arc<dyn ResponseProvider>>,
        config: &EngramConfig,
    ) -> Self {
        let consolidation = ConsolidationEngine::new(
            store.clone(),
            provider.clone(),
            config.agent.consolidation_age_hours,
            config.agent.cloud_privacy_ceiling,
        );
        Self {
            retrieval: RetrievalEngine::new(store.clone(), embedder.clone()),
            privacy: PrivacyAnalyzer::new(),
            consolidation,
            store,
            embedder,
            provider,
            config: config.agent.clone(),
            retrieval_config: config.retrieval.clone(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval_config
    }

    pub fn privacy(&self) -> &PrivacyAnalyzer {
        &self.privacy
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Verify the store is reachable and mark the agent ready.
    pub async fn initialize(&self) -> Result<(), AgentError> {
        let stm = self
            .store
            .count(RecordKind::ShortTerm)
            .await
            .map_err(AgentError::storage)?;
        self.initialized.store(true, Ordering::Release);
        info!(
            short_term = stm,
            semantic_search = self.embedder.is_some(),
            provider = self.provider.is_some(),
            "agent initialized"
        );
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), AgentError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AgentError::NotInitialized)
        }
    }

    fn available_provider(&self) -> Result<&Arc<dyn ResponseProvider>, AgentError> {
        self.provider
            .as_ref()
            .filter(|p| p.is_available())
            .ok_or(AgentError::ProviderUnavailable { provider: "response" })
    }

    // ── Ingestion ────────────────────────────────────────────────────────────

    /// Store incoming content as short-term memory, or long-term memory when
    /// it is important enough, linking entities it mentions.
    ///
    /// Recognized `metadata` keys: `importance` (number, can only raise the
    /// computed importance), `title` (notes), `tags` (array of strings).
    pub async fn ingest(
        &self,
        kind: IngestKind,
        content: &str,
        confidence: f64,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<IngestOutcome, AgentError> {
        self.ensure_initialized()?;

        let mut importance = (kind.base_importance() * confidence.clamp(0.0, 1.0)).clamp(0.0, 1.0);
        if let Some(hint) = metadata.get("importance").and_then(|v| v.as_f64()) {
            importance = importance.max(hint.clamp(0.0, 1.0));
        }

        let mut tags = vec![kind.as_str().to_string()];
        if kind == IngestKind::HealthData {
            tags.push("health".into());
        }
        if let Some(extra) = metadata.get("tags").and_then(|v| v.as_array()) {
            for tag in extra.iter().filter_map(|t| t.as_str()) {
                if !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_string());
                }
            }
        }

        let linked = self.mentioned_entities(content).await?;
        let linked_ids: Vec<String> = linked.iter().map(|e| e.id.clone()).collect();
        let embedding = self.embed(content).await;
        let embedded = embedding.is_some();

        // Everything below commits as one batch.
        let mut batch: Vec<Mutation> = linked.iter().cloned().map(Mutation::insert).collect();

        let (memory_id, stored_as) = if importance >= self.config.direct_ltm_importance {
            let mut ltm = LongTermMemory::new(content, kind.as_str(), importance);
            ltm.related_entity_ids = linked_ids.clone();
            ltm.related_concepts = tags.clone();
            ltm.retrieval_cues = tokenize(content).into_iter().take(5).collect();
            ltm.embedding = embedding;
            let id = ltm.id.clone();
            batch.push(Mutation::insert(ltm));
            (id, RecordKind::LongTerm)
        } else {
            let mut stm = ShortTermMemory::new(content, kind.memory_type(), importance);
            stm.related_entity_ids = linked_ids.clone();
            stm.context_tags = tags.clone();
            stm.embedding = embedding;
            let id = stm.id.clone();
            batch.push(Mutation::insert(stm));
            (id, RecordKind::ShortTerm)
        };

        let note_id = if kind == IngestKind::Note {
            let title = metadata
                .get("title")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| note_title(content));
            let mut note = Note::new(title, content);
            note.tags = tags.clone();
            let id = note.id.clone();
            batch.push(Mutation::insert(note));
            Some(id)
        } else {
            None
        };

        let episodic_id = if kind == IngestKind::UserInteraction {
            let mut episode = EpisodicMemory::new(content, importance);
            episode.participants = linked.iter().map(|e| e.name.clone()).collect();
            episode.contextual_cues = tags.clone();
            let id = episode.id.clone();
            batch.push(Mutation::insert(episode));
            Some(id)
        } else {
            None
        };

        self.apply(batch).await?;
        info!(
            kind = %kind,
            id = %memory_id,
            stored_as = %stored_as,
            importance,
            entities = linked_ids.len(),
            "ingested"
        );

        Ok(IngestOutcome {
            memory_id,
            stored_as,
            importance,
            linked_entity_ids: linked_ids,
            note_id,
            episodic_id,
            embedded,
        })
    }

    async fn embed(&self, text: &str) -> Option<Embedding> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) => Some(Embedding::new(vector)),
            Err(e) => {
                warn!(error = %e, "embedding failed, storing without vector");
                None
            }
        }
    }

    /// Entities whose name or an alias appears in `content`, with
    /// `last_mentioned` bumped. The caller writes them back.
    async fn mentioned_entities(&self, content: &str) -> Result<Vec<Entity>, AgentError> {
        let entities = self.entities().await?;
        let haystack = padded_words(content);
        let now = Utc::now();

        let mut linked = Vec::new();
        for mut entity in entities {
            if entity.surface_forms().any(|form| mentions(&haystack, &form)) {
                entity.last_mentioned = now;
                linked.push(entity);
            }
        }
        Ok(linked)
    }

    async fn entities(&self) -> Result<Vec<Entity>, AgentError> {
        fetch_as::<Entity>(self.store.as_ref(), FetchRequest::new(RecordKind::Entity))
            .await
            .map_err(AgentError::storage)
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), AgentError> {
        self.store.apply(batch).await.map_err(AgentError::storage)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Retrieve context for `query`, or an empty context when RAG is disabled.
    pub async fn retrieve(&self, query: &str) -> Result<MemoryContext, AgentError> {
        self.ensure_initialized()?;
        if !self.config.enable_rag {
            return Ok(MemoryContext::empty(query));
        }
        self.retrieval.retrieve(query, &self.retrieval_config).await
    }

    pub fn analyze_privacy(&self, text: &str, context: Option<&MemoryContext>) -> PrivacyAnalysis {
        self.privacy.analyze(text, context)
    }

    /// Retrieve, classify and answer `query`.
    pub async fn query(&self, query: &str) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();
        let context = self.retrieve(query).await?;
        let analysis = self.privacy.analyze(query, Some(&context));
        let mut response = self.respond(&context, &analysis).await?;
        response.processing_time_seconds = started.elapsed().as_secs_f64();
        Ok(response)
    }

    /// Generate an answer from an already retrieved and classified context.
    ///
    /// Off-device providers see the context filtered to the cloud privacy
    /// ceiling, or to `public` (with a sanitized query) when the query itself
    /// must stay on the device.
    pub async fn respond(
        &self,
        context: &MemoryContext,
        analysis: &PrivacyAnalysis,
    ) -> Result<AgentResponse, AgentError> {
        self.ensure_initialized()?;
        let started = Instant::now();
        let provider = self.available_provider()?;

        let visible = if provider.is_on_device() {
            context.clone()
        } else {
            let target = if analysis.requires_on_device {
                PrivacyLevel::Public
            } else {
                self.config.cloud_privacy_ceiling
            };
            self.privacy.filter_context(context, target)
        };
        let prompt = build_prompt(
            &visible.user_query,
            &visible.render(self.config.max_context_size),
        );
        let generated = provider
            .generate(&prompt, &visible)
            .await
            .map_err(AgentError::generation)?;

        debug!(
            model = %generated.model_used,
            on_device = generated.is_on_device,
            tokens = ?generated.tokens_used,
            items = visible.total_items(),
            "response generated"
        );

        Ok(AgentResponse {
            content: generated.content,
            confidence: generated.confidence.clamp(0.0, 1.0),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            autonomous_actions: Vec::new(),
            model_used: generated.model_used,
            is_on_device: generated.is_on_device,
            privacy_level: analysis.level,
            search_mode: context.search_mode,
        })
    }

    // ── Upkeep ───────────────────────────────────────────────────────────────

    pub async fn consolidate_now(&self) -> Result<ConsolidationReport, AgentError> {
        self.ensure_initialized()?;
        self.consolidation.sweep().await
    }

    /// Remember an exchange as a short-term memory and an episode.
    /// Returns the ids of both records.
    pub async fn store_interaction(
        &self,
        query: &str,
        response: &str,
    ) -> Result<(String, String), AgentError> {
        self.ensure_initialized()?;
        let (ids, batch) = self.interaction_batch(query, response).await;
        self.apply(batch).await?;
        Ok(ids)
    }

    /// Persist a learning record together with the interaction memories of
    /// its exchange. Either all three records are written or none is.
    pub async fn store_learning_record(
        &self,
        record: InteractionRecord,
    ) -> Result<(String, String), AgentError> {
        self.ensure_initialized()?;
        let (ids, mut batch) = self.interaction_batch(&record.query, &record.response).await;
        batch.insert(0, Mutation::insert(record));
        self.apply(batch).await?;
        Ok(ids)
    }

    async fn interaction_batch(&self, query: &str, response: &str) -> ((String, String), Vec<Mutation>) {
        let mut stm = ShortTermMemory::new(
            format!("Q: {query}\nA: {response}"),
            MemoryType::Episodic,
            IngestKind::UserInteraction.base_importance(),
        );
        stm.context_tags = vec!["interaction".into()];
        stm.embedding = self.embed(query).await;

        let mut episode = EpisodicMemory::new(
            format!("Asked: {}", summarize(query, 200)),
            IngestKind::UserInteraction.base_importance(),
        );
        episode.contextual_cues = tokenize(query).into_iter().take(5).collect();

        let ids = (stm.id.clone(), episode.id.clone());
        (ids, vec![Mutation::insert(stm), Mutation::insert(episode)])
    }

    /// Save `text` as a note tagged `task`.
    pub async fn record_task(&self, text: &str) -> Result<Note, AgentError> {
        self.ensure_initialized()?;
        let mut note = Note::new(note_title(text), text);
        note.tags = vec!["task".into()];
        self.apply(vec![Mutation::insert(note.clone())]).await?;
        debug!(note_id = %note.id, "task recorded");
        Ok(note)
    }

    /// Ask the provider for the entities in `text` and upsert them.
    ///
    /// Returns every extracted entity, new or already known. Text above the
    /// cloud privacy ceiling is never sent to an off-device provider.
    pub async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>, AgentError> {
        self.ensure_initialized()?;
        let provider = self.available_provider()?;
        if !provider.is_on_device() && self.privacy.level_of(text) > self.config.cloud_privacy_ceiling {
            return Err(AgentError::ProviderUnavailable {
                provider: "on-device response",
            });
        }

        let prompt = format!(
            "List the people, places, organizations and projects mentioned below, \
             one per line as `name | type`.\n\n{text}"
        );
        let reply = provider
            .generate(&prompt, &MemoryContext::empty(text))
            .await
            .map_err(AgentError::generation)?;

        let known = self.entities().await?;
        let now = Utc::now();
        let mut extracted: Vec<Entity> = Vec::new();

        for (name, entity_type) in parse_entity_lines(&reply.content) {
            let lowered = name.to_lowercase();
            if extracted.iter().any(|e| e.surface_forms().any(|f| f == lowered)) {
                continue;
            }
            let entity = match known.iter().find(|e| e.surface_forms().any(|f| f == lowered)) {
                Some(existing) => {
                    let mut entity = existing.clone();
                    entity.last_mentioned = now;
                    entity
                }
                None => {
                    let mut entity = Entity::new(name, entity_type);
                    entity.embedding = self.embed(&entity.name).await;
                    entity
                }
            };
            extracted.push(entity);
        }
        self.apply(extracted.iter().cloned().map(Mutation::insert).collect())
            .await?;

        info!(count = extracted.len(), "entities extracted");
        Ok(extracted)
    }

    /// Link every pair of `entity_ids` with a `co_mentioned` relationship,
    /// skipping pairs that are already linked. Returns the number created.
    pub async fn update_graph(&self, entity_ids: &[String]) -> Result<usize, AgentError> {
        self.ensure_initialized()?;

        let mut ids: Vec<&String> = entity_ids.iter().collect::<HashSet<_>>().into_iter().collect();
        ids.sort();
        if ids.len() < 2 {
            return Ok(0);
        }

        let request = FetchRequest::new(RecordKind::Relationship)
            .filter(Filter::InvolvesEntities(entity_ids.to_vec()));
        let existing = fetch_as::<Relationship>(self.store.as_ref(), request)
            .await
            .map_err(AgentError::storage)?;
        let mut linked: HashSet<(String, String)> = existing
            .iter()
            .filter(|r| r.predicate == CO_MENTIONED)
            .map(|r| ordered_pair(&r.subject_id, &r.object_id))
            .collect();

        let mut batch = Vec::new();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                if linked.insert(ordered_pair(a, b)) {
                    batch.push(Mutation::insert(Relationship::new(
                        a.as_str(),
                        CO_MENTIONED,
                        b.as_str(),
                    )));
                }
            }
        }
        let created = batch.len();
        self.apply(batch).await?;
        debug!(created, "graph updated");
        Ok(created)
    }

    /// Delete short-term memories older than `max_age_days` (capped at
    /// [`MAX_AGE_DAYS`]) whose importance is below `importance_floor`.
    /// Returns the number deleted.
    pub async fn cleanup(&self, max_age_days: u64, importance_floor: f64) -> Result<usize, AgentError> {
        self.ensure_initialized()?;
        let cutoff = Utc::now() - Duration::days(max_age_days.min(MAX_AGE_DAYS) as i64);
        let request = FetchRequest::new(RecordKind::ShortTerm)
            .filter(Filter::OlderThan(cutoff))
            .sort(Sort::OldestFirst);
        let stale = fetch_as::<ShortTermMemory>(self.store.as_ref(), request)
            .await
            .map_err(AgentError::storage)?;

        let mut deleted = 0;
        for stm in stale.iter().filter(|m| m.importance < importance_floor) {
            if self
                .store
                .delete(RecordKind::ShortTerm, &stm.id)
                .await
                .map_err(AgentError::storage)?
            {
                deleted += 1;
            }
        }
        info!(deleted, max_age_days, "short-term cleanup complete");
        Ok(deleted)
    }

    /// Record counts per kind.
    pub async fn counts(&self) -> Result<HashMap<RecordKind, usize>, AgentError> {
        let mut counts = HashMap::new();
        for kind in RecordKind::ALL {
            let n = self.store.count(kind).await.map_err(AgentError::storage)?;
            counts.insert(kind, n);
        }
        Ok(counts)
    }

    pub async fn save(&self) -> Result<(), AgentError> {
        self.store.save().await.map_err(AgentError::storage)
    }
}

fn build_prompt(query: &str, context: &str) -> String {
    if context.is_empty() {
        format!("Answer the user's question.\n\nQuestion: {query}")
    } else {
        format!(
            "Answer the user's question using the memories below when relevant.\n\n\
             Memories:\n{context}\n\nQuestion: {query}"
        )
    }
}

/// First line of `content`, shortened for use as a note title.
fn note_title(content: &str) -> String {
    summarize(content.lines().next().unwrap_or_default(), 60)
}

/// Lower-cased words joined by single spaces, padded with a space on each side.
fn padded_words(text: &str) -> String {
    let joined: Vec<String> = words(text).collect();
    format!(" {} ", joined.join(" "))
}

/// Whole-word (or whole-phrase) occurrence of `form` in a [`padded_words`] haystack.
fn mentions(haystack: &str, form: &str) -> bool {
    let needle = padded_words(form);
    !needle.trim().is_empty() && haystack.contains(&needle)
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Parse `name | type` lines; lines without a type default to `"thing"`.
fn parse_entity_lines(reply: &str) -> Vec<(String, String)> {
    reply
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, '|');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let entity_type = parts
                .next()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "thing".to_string());
            Some((name.to_string(), entity_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_kind_parsing() {
        assert_eq!("health_data".parse::<IngestKind>().unwrap(), IngestKind::HealthData);
        assert!("video".parse::<IngestKind>().is_err());
        assert_eq!(IngestKind::Note.base_importance(), 0.7);
    }

    #[test]
    fn mentions_match_whole_words_only() {
        let haystack = padded_words("Coffee with Ana at Blue Bottle!");
        assert!(mentions(&haystack, "ana"));
        assert!(mentions(&haystack, "Blue Bottle"));
        assert!(!mentions(&haystack, "an"));
        assert!(!mentions(&haystack, ""));
    }

    #[test]
    fn entity_lines_are_parsed_leniently() {
        let parsed = parse_entity_lines("- Ana | Person\n\n* Lisbon|place\nRustConf\n | nothing");
        assert_eq!(
            parsed,
            vec![
                ("Ana".to_string(), "person".to_string()),
                ("Lisbon".to_string(), "place".to_string()),
                ("RustConf".to_string(), "thing".to_string()),
            ]
        );
    }

    #[test]
    fn note_titles_use_first_line() {
        assert_eq!(note_title("Groceries\nmilk, eggs"), "Groceries");
        assert_eq!(note_title(""), "");
    }

    #[test]
    fn prompt_includes_context_only_when_present() {
        assert!(!build_prompt("hi", "").contains("Memories"));
        assert!(build_prompt("hi", "[recent] x").contains("[recent] x"));
    }
}
