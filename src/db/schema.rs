//! SQL DDL for all Engram tables.
//!
//! One table per record kind. List-valued fields are JSON text, embeddings
//! are little-endian f32 BLOBs, timestamps are RFC 3339 text. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// The schema version that the current binary writes.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS short_term_memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL CHECK(memory_type IN ('episodic','semantic','procedural','emotional','working')),
    importance REAL NOT NULL DEFAULT 0.5 CHECK(importance >= 0.0 AND importance <= 1.0),
    timestamp TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    related_entity_ids TEXT NOT NULL DEFAULT '[]',
    context_tags TEXT NOT NULL DEFAULT '[]',
    emotional_weight REAL NOT NULL DEFAULT 0.0,
    embedding BLOB,
    embedded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_stm_timestamp ON short_term_memories(timestamp);

CREATE TABLE IF NOT EXISTS long_term_memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    summary TEXT NOT NULL,
    category TEXT NOT NULL,
    importance REAL NOT NULL CHECK(importance >= 0.0 AND importance <= 1.0),
    source_stm_ids TEXT NOT NULL DEFAULT '[]',
    related_entity_ids TEXT NOT NULL DEFAULT '[]',
    related_concepts TEXT NOT NULL DEFAULT '[]',
    retrieval_cues TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    strength_score REAL NOT NULL DEFAULT 0.0,
    embedding BLOB,
    embedded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_ltm_last_accessed ON long_term_memories(last_accessed);

CREATE TABLE IF NOT EXISTS episodic_memories (
    id TEXT PRIMARY KEY,
    event_description TEXT NOT NULL,
    location TEXT,
    participants TEXT NOT NULL DEFAULT '[]',
    emotional_tone TEXT NOT NULL DEFAULT 'neutral',
    importance REAL NOT NULL CHECK(importance >= 0.0 AND importance <= 1.0),
    contextual_cues TEXT NOT NULL DEFAULT '[]',
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_episodic_timestamp ON episodic_memories(timestamp);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    description TEXT,
    aliases TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    last_mentioned TEXT NOT NULL,
    embedding BLOB,
    embedded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name);

CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    subject_id TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_relationships_subject ON relationships(subject_id);
CREATE INDEX IF NOT EXISTS idx_relationships_object ON relationships(object_id);

CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_updated ON notes(updated_at);

-- Learning records, one per orchestrator cycle
CREATE TABLE IF NOT EXISTS interactions (
    id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    response TEXT NOT NULL,
    intent TEXT NOT NULL,
    privacy_level TEXT NOT NULL,
    confidence REAL NOT NULL,
    model_used TEXT NOT NULL,
    actions TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Read the stored schema version.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}
