//! Memory record definitions.
//!
//! Every persisted record implements [`MemoryItem`] (id, content, timestamp,
//! optional embedding) so ranking and privacy code can treat them uniformly,
//! and [`Record`] so the store can move them in and out of the
//! [`MemoryRecord`] tagged union.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cognitive category of a short-term memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Something that happened: a conversation, a transcription, an interaction.
    Episodic,
    /// A fact or piece of knowledge.
    Semantic,
    /// A workflow or how-to.
    Procedural,
    /// A feeling or mood attached to a moment.
    Emotional,
    /// Scratch context for an ongoing task.
    Working,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Emotional => "emotional",
            Self::Working => "working",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "emotional" => Ok(Self::Emotional),
            "working" => Ok(Self::Working),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// Discriminant for every record kind the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ShortTerm,
    LongTerm,
    Episodic,
    Entity,
    Relationship,
    Note,
    Interaction,
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        Self::ShortTerm,
        Self::LongTerm,
        Self::Episodic,
        Self::Entity,
        Self::Relationship,
        Self::Note,
        Self::Interaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Episodic => "episodic",
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Note => "note",
            Self::Interaction => "interaction",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An embedding vector together with the time it was generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub generated_at: DateTime<Utc>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            generated_at: Utc::now(),
        }
    }

    /// Fractional days elapsed between generation and `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        age_in_days(self.generated_at, now)
    }
}

/// Fractional days between two instants, clamped at zero.
pub fn age_in_days(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - then).num_seconds().max(0) as f64;
    seconds / 86_400.0
}

/// Capability shared by all persisted records.
pub trait MemoryItem {
    fn id(&self) -> &str;
    /// Text of the record used for scoring and privacy classification.
    fn content(&self) -> Cow<'_, str>;
    /// Text a containment filter matches against. Covers the same fields as
    /// the store's searchable columns.
    fn search_text(&self) -> Cow<'_, str> {
        self.content()
    }
    /// The instant recency is measured from.
    fn timestamp(&self) -> DateTime<Utc>;
    fn embedding(&self) -> Option<&Embedding> {
        None
    }
}

/// A typed record that can be moved in and out of [`MemoryRecord`].
pub trait Record: MemoryItem + Sized {
    const KIND: RecordKind;
    fn from_record(record: MemoryRecord) -> Option<Self>;
    fn into_record(self) -> MemoryRecord;
}

/// A fresh time-sortable identifier.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// A short-lived memory fragment awaiting consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermMemory {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    /// Importance in `[0.0, 1.0]`.
    pub importance: f64,
    pub timestamp: DateTime<Utc>,
    /// Number of times this memory has been returned by retrieval.
    pub access_count: u32,
    pub related_entity_ids: Vec<String>,
    pub context_tags: Vec<String>,
    pub emotional_weight: f64,
    pub embedding: Option<Embedding>,
}

impl ShortTermMemory {
    pub fn new(content: impl Into<String>, memory_type: MemoryType, importance: f64) -> Self {
        Self {
            id: new_id(),
            content: content.into(),
            memory_type,
            importance: importance.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            access_count: 0,
            related_entity_ids: Vec::new(),
            context_tags: Vec::new(),
            emotional_weight: 0.0,
            embedding: None,
        }
    }
}

/// A durable memory, created by promotion or high-importance ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    pub id: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    pub importance: f64,
    /// Ids of the short-term memories this record was promoted from.
    pub source_stm_ids: Vec<String>,
    pub related_entity_ids: Vec<String>,
    pub related_concepts: Vec<String>,
    pub retrieval_cues: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub strength_score: f64,
    pub embedding: Option<Embedding>,
}

impl LongTermMemory {
    pub fn new(content: impl Into<String>, category: impl Into<String>, importance: f64) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: new_id(),
            summary: summarize(&content, 120),
            content,
            category: category.into(),
            importance: importance.clamp(0.0, 1.0),
            source_stm_ids: Vec::new(),
            related_entity_ids: Vec::new(),
            related_concepts: Vec::new(),
            retrieval_cues: Vec::new(),
            created_at: now,
            last_accessed: now,
            strength_score: importance.clamp(0.0, 1.0),
            embedding: None,
        }
    }
}

/// A record of a specific event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub id: String,
    pub event_description: String,
    pub location: Option<String>,
    pub participants: Vec<String>,
    pub emotional_tone: String,
    pub importance: f64,
    pub contextual_cues: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl EpisodicMemory {
    pub fn new(event_description: impl Into<String>, importance: f64) -> Self {
        Self {
            id: new_id(),
            event_description: event_description.into(),
            location: None,
            participants: Vec::new(),
            emotional_tone: "neutral".into(),
            importance: importance.clamp(0.0, 1.0),
            contextual_cues: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// A person, place, project, or thing that memories refer to by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub last_mentioned: DateTime<Utc>,
    pub embedding: Option<Embedding>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            entity_type: entity_type.into(),
            description: None,
            aliases: Vec::new(),
            tags: Vec::new(),
            last_mentioned: Utc::now(),
            embedding: None,
        }
    }

    /// Name and aliases, lower-cased.
    pub fn surface_forms(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.name)
            .chain(self.aliases.iter())
            .map(|s| s.to_lowercase())
    }
}

/// A directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub subject_id: String,
    /// Relationship label (e.g. `"works_at"`, `"co_mentioned"`).
    pub predicate: String,
    pub object_id: String,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(
        subject_id: impl Into<String>,
        predicate: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            subject_id: subject_id.into(),
            predicate: predicate.into(),
            object_id: object_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, entity_id: &str) -> bool {
        self.subject_id == entity_id || self.object_id == entity_id
    }
}

/// A user-authored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Learning record of one orchestrator cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub query: String,
    pub response: String,
    pub intent: String,
    pub privacy_level: String,
    pub confidence: f64,
    pub model_used: String,
    /// Serialized perception, reasoning and action summary.
    pub actions: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Tagged union over every record kind.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryRecord {
    ShortTerm(ShortTermMemory),
    LongTerm(LongTermMemory),
    Episodic(EpisodicMemory),
    Entity(Entity),
    Relationship(Relationship),
    Note(Note),
    Interaction(InteractionRecord),
}

impl MemoryRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::ShortTerm(_) => RecordKind::ShortTerm,
            Self::LongTerm(_) => RecordKind::LongTerm,
            Self::Episodic(_) => RecordKind::Episodic,
            Self::Entity(_) => RecordKind::Entity,
            Self::Relationship(_) => RecordKind::Relationship,
            Self::Note(_) => RecordKind::Note,
            Self::Interaction(_) => RecordKind::Interaction,
        }
    }

    pub fn as_item(&self) -> &dyn MemoryItem {
        match self {
            Self::ShortTerm(r) => r,
            Self::LongTerm(r) => r,
            Self::Episodic(r) => r,
            Self::Entity(r) => r,
            Self::Relationship(r) => r,
            Self::Note(r) => r,
            Self::Interaction(r) => r,
        }
    }

    pub fn id(&self) -> &str {
        self.as_item().id()
    }
}

impl MemoryItem for ShortTermMemory {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.content)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }
}

impl MemoryItem for LongTermMemory {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.content)
    }
    fn search_text(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}\n{}", self.content, self.summary))
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.last_accessed
    }
    fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }
}

impl MemoryItem for EpisodicMemory {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.event_description)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl MemoryItem for Entity {
    fn id(&self) -> &str {
        &self.id
    }
    /// Name, aliases and description.
    fn content(&self) -> Cow<'_, str> {
        if self.aliases.is_empty() && self.description.is_none() {
            return Cow::Borrowed(&self.name);
        }
        let mut text = self.name.clone();
        for alias in &self.aliases {
            text.push(' ');
            text.push_str(alias);
        }
        if let Some(description) = &self.description {
            text.push(' ');
            text.push_str(description);
        }
        Cow::Owned(text)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.last_mentioned
    }
    fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }
}

impl MemoryItem for Relationship {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{} {} {}", self.subject_id, self.predicate, self.object_id))
    }
    fn search_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.predicate)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl MemoryItem for Note {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}\n{}", self.title, self.content))
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl MemoryItem for InteractionRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn content(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.query)
    }
    fn search_text(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}\n{}", self.query, self.response))
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

macro_rules! impl_record {
    ($ty:ty, $variant:ident) => {
        impl Record for $ty {
            const KIND: RecordKind = RecordKind::$variant;

            fn from_record(record: MemoryRecord) -> Option<Self> {
                match record {
                    MemoryRecord::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_record(self) -> MemoryRecord {
                MemoryRecord::$variant(self)
            }
        }

        impl From<$ty> for MemoryRecord {
            fn from(record: $ty) -> Self {
                MemoryRecord::$variant(record)
            }
        }
    };
}

impl_record!(ShortTermMemory, ShortTerm);
impl_record!(LongTermMemory, LongTerm);
impl_record!(EpisodicMemory, Episodic);
impl_record!(Entity, Entity);
impl_record!(Relationship, Relationship);
impl_record!(Note, Note);
impl_record!(InteractionRecord, Interaction);

/// First `max_chars` characters of `content`, with "..." when cut.
pub fn summarize(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
