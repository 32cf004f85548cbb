use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::memory::RecordKind;
use crate::privacy::PrivacyLevel;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EngramConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
    pub retrieval: RetrievalConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    /// Retrieve memory context for queries.
    pub enable_rag: bool,
    /// Run the periodic consolidation sweep.
    pub enable_consolidation: bool,
    /// Token budget for the rendered prompt context.
    pub max_context_size: usize,
    pub consolidation_interval_seconds: u64,
    /// Minimum recommendation confidence for an autonomous action to run.
    pub action_confidence_threshold: f64,
    /// Short-term memories older than this are consolidated.
    pub consolidation_age_hours: u64,
    /// Ingested content at or above this importance goes straight to long-term memory.
    pub direct_ltm_importance: f64,
    /// Highest privacy level an off-device provider may see.
    pub cloud_privacy_ceiling: PrivacyLevel,
    pub cleanup_max_age_days: u64,
    pub cleanup_importance_floor: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_results: usize,
    pub recency_weight: f64,
    pub relevance_weight: f64,
    pub include_short_term: bool,
    pub include_long_term: bool,
    pub include_episodic: bool,
    pub include_entities: bool,
    pub include_notes: bool,
    pub enable_semantic_search: bool,
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// Minimum keyword/recency score.
    pub relevance_threshold: f64,
    /// Minimum hybrid score.
    pub semantic_similarity_threshold: f64,
    /// Item embeddings older than this are ignored.
    pub embedding_max_age_days: u64,
    /// Store-level candidates fetched per returned result.
    pub candidate_multiplier: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub insight_interval_seconds: u64,
    pub max_insights: usize,
    pub history_limit: usize,
    /// Short-term memory count above which consolidation is recommended.
    pub stm_backlog_threshold: usize,
    /// Queries with at least this many words are candidates for entity extraction.
    pub long_query_words: usize,
    pub debounce_millis: u64,
}

/// Upper bound for every age threshold, in days.
pub const MAX_AGE_DAYS: u64 = 36_500;
/// Upper bound for every background task period, in seconds.
pub const MAX_INTERVAL_SECONDS: u64 = 30 * 24 * 3600;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_engram_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enable_rag: true,
            enable_consolidation: true,
            max_context_size: 2000,
            consolidation_interval_seconds: 3600,
            action_confidence_threshold: 0.8,
            consolidation_age_hours: 24,
            direct_ltm_importance: 0.85,
            cloud_privacy_ceiling: PrivacyLevel::Contextual,
            cleanup_max_age_days: 7,
            cleanup_importance_floor: 0.2,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            recency_weight: 0.3,
            relevance_weight: 0.7,
            include_short_term: true,
            include_long_term: true,
            include_episodic: true,
            include_entities: true,
            include_notes: true,
            enable_semantic_search: true,
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            relevance_threshold: 0.1,
            semantic_similarity_threshold: 0.3,
            embedding_max_age_days: 90,
            candidate_multiplier: 3,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            insight_interval_seconds: 1800,
            max_insights: 20,
            history_limit: 50,
            stm_backlog_threshold: 50,
            long_query_words: 12,
            debounce_millis: 300,
        }
    }
}

impl RetrievalConfig {
    pub fn includes(&self, kind: RecordKind) -> bool {
        match kind {
            RecordKind::ShortTerm => self.include_short_term,
            RecordKind::LongTerm => self.include_long_term,
            RecordKind::Episodic => self.include_episodic,
            RecordKind::Entity => self.include_entities,
            RecordKind::Note => self.include_notes,
            RecordKind::Relationship | RecordKind::Interaction => false,
        }
    }

    /// Per-type share of `max_results`: half for short- and long-term
    /// memories, a third for episodic memories and notes, a quarter for
    /// entities. At least one whenever `max_results > 0`.
    pub fn type_cap(&self, kind: RecordKind) -> usize {
        if self.max_results == 0 {
            return 0;
        }
        let share = match kind {
            RecordKind::ShortTerm | RecordKind::LongTerm => self.max_results / 2,
            RecordKind::Episodic | RecordKind::Note => self.max_results / 3,
            RecordKind::Entity => self.max_results / 4,
            RecordKind::Relationship | RecordKind::Interaction => return 0,
        };
        share.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("recency_weight", self.recency_weight),
            ("relevance_weight", self.relevance_weight),
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("relevance_threshold", self.relevance_threshold),
            ("semantic_similarity_threshold", self.semantic_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("retrieval.{name} must be between 0.0 and 1.0, got {value}");
            }
        }
        if self.candidate_multiplier == 0 {
            bail!("retrieval.candidate_multiplier must be at least 1");
        }
        check_at_most("retrieval.embedding_max_age_days", self.embedding_max_age_days, MAX_AGE_DAYS)?;
        Ok(())
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngramConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngramConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if !(0.0..=1.0).contains(&self.agent.action_confidence_threshold) {
            bail!(
                "agent.action_confidence_threshold must be between 0.0 and 1.0, got {}",
                self.agent.action_confidence_threshold
            );
        }
        for (name, seconds) in [
            ("agent.consolidation_interval_seconds", self.agent.consolidation_interval_seconds),
            ("orchestrator.insight_interval_seconds", self.orchestrator.insight_interval_seconds),
        ] {
            if seconds == 0 {
                bail!("{name} must be positive");
            }
            check_at_most(name, seconds, MAX_INTERVAL_SECONDS)?;
        }
        check_at_most(
            "agent.consolidation_age_hours",
            self.agent.consolidation_age_hours,
            MAX_AGE_DAYS * 24,
        )?;
        check_at_most("agent.cleanup_max_age_days", self.agent.cleanup_max_age_days, MAX_AGE_DAYS)?;
        check_at_most(
            "orchestrator.debounce_millis",
            self.orchestrator.debounce_millis,
            MAX_INTERVAL_SECONDS * 1000,
        )?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// (ENGRAM_DB, ENGRAM_LOG_LEVEL, ENGRAM_CONSOLIDATION_INTERVAL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_CONSOLIDATION_INTERVAL") {
            match val.parse::<u64>() {
                Ok(seconds) => self.agent.consolidation_interval_seconds = seconds,
                Err(_) => warn!(value = %val, "ignoring non-numeric ENGRAM_CONSOLIDATION_INTERVAL"),
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

fn check_at_most(name: &str, value: u64, max: u64) -> Result<()> {
    if value > max {
        bail!("{name} must be at most {max}, got {value}");
    }
    Ok(())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
