//! SQLite-backed [`MemoryStore`].
//!
//! A single connection sits behind a mutex; every call runs on the blocking
//! pool so async callers never stall the runtime on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};

use crate::memory::store::{FetchRequest, Filter, MemoryStore, Mutation, Sort, MAX_PREDICATE_TERMS};
use crate::memory::types::{
    EpisodicMemory, Embedding, Entity, InteractionRecord, LongTermMemory, MemoryRecord,
    RecordKind, Relationship, ShortTermMemory, Note,
};
use crate::memory::{bytes_to_embedding, embedding_to_bytes};

use super::FOLD_FUNCTION;

/// Per-kind table layout used to build fetch statements.
struct Table {
    name: &'static str,
    searchable: &'static [&'static str],
    time_column: &'static str,
    has_importance: bool,
}

fn table(kind: RecordKind) -> Table {
    match kind {
        RecordKind::ShortTerm => Table {
            name: "short_term_memories",
            searchable: &["content"],
            time_column: "timestamp",
            has_importance: true,
        },
        RecordKind::LongTerm => Table {
            name: "long_term_memories",
            searchable: &["content", "summary"],
            time_column: "last_accessed",
            has_importance: true,
        },
        RecordKind::Episodic => Table {
            name: "episodic_memories",
            searchable: &["event_description"],
            time_column: "timestamp",
            has_importance: true,
        },
        RecordKind::Entity => Table {
            name: "entities",
            searchable: &["name", "description", "aliases"],
            time_column: "last_mentioned",
            has_importance: false,
        },
        RecordKind::Relationship => Table {
            name: "relationships",
            searchable: &["predicate"],
            time_column: "created_at",
            has_importance: false,
        },
        RecordKind::Note => Table {
            name: "notes",
            searchable: &["title", "content"],
            time_column: "updated_at",
            has_importance: false,
        },
        RecordKind::Interaction => Table {
            name: "interactions",
            searchable: &["query", "response"],
            time_column: "timestamp",
            has_importance: false,
        },
    }
}

/// SQLite implementation of [`MemoryStore`].
#[derive(Clone)]
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    /// Wrap a connection whose schema is already initialized.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(super::open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(super::open_memory_database()?))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await
        .context("database task failed")?
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<MemoryRecord>> {
        self.with_conn(move |conn| fetch_records(conn, &request)).await
    }

    async fn insert(&self, record: MemoryRecord) -> Result<()> {
        self.with_conn(move |conn| insert_record(conn, &record)).await
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| delete_record(conn, kind, &id)).await
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| apply_batch(conn, &batch)).await
    }

    async fn save(&self) -> Result<()> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("PRAGMA wal_checkpoint(PASSIVE)")?;
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
            Ok(())
        })
        .await
    }

    async fn count(&self, kind: RecordKind) -> Result<usize> {
        self.with_conn(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", table(kind).name);
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn touch(&self, kind: RecordKind, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| touch_records(conn, kind, &ids)).await
    }
}

// ── Fetch ────────────────────────────────────────────────────────────────────

fn fetch_records(conn: &Connection, request: &FetchRequest) -> Result<Vec<MemoryRecord>> {
    let (sql, values) = build_select(request)?;
    let mut stmt = conn.prepare(&sql)?;
    let kind = request.kind;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| map_row(kind, row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Build the SELECT statement and its positional parameters for a fetch.
fn build_select(request: &FetchRequest) -> Result<(String, Vec<Value>)> {
    let table = table(request.kind);
    let mut values: Vec<Value> = Vec::new();

    let where_clause = match &request.filter {
        Filter::All => None,
        Filter::ContainsAny(terms) => {
            if terms.len() > MAX_PREDICATE_TERMS {
                bail!(
                    "predicate has {} terms; at most {MAX_PREDICATE_TERMS} are supported",
                    terms.len()
                );
            }
            if terms.is_empty() {
                Some("0".to_string())
            } else {
                let mut clauses = Vec::new();
                for term in terms {
                    values.push(Value::Text(format!("%{}%", escape_like(&term.to_lowercase()))));
                    let idx = values.len();
                    for column in table.searchable {
                        clauses.push(format!(
                            "{FOLD_FUNCTION}(COALESCE({column}, '')) LIKE ?{idx} ESCAPE '\\'"
                        ));
                    }
                }
                Some(clauses.join(" OR "))
            }
        }
        Filter::OlderThan(instant) => {
            values.push(Value::Text(format_timestamp(*instant)));
            Some(format!("{} < ?{}", table.time_column, values.len()))
        }
        Filter::Ids(ids) => Some(in_clause("id", ids, &mut values)),
        Filter::InvolvesEntities(ids) => {
            if request.kind == RecordKind::Relationship {
                let subject = in_clause("subject_id", ids, &mut values);
                let object = in_clause("object_id", ids, &mut values);
                Some(format!("({subject}) OR ({object})"))
            } else {
                Some("0".to_string())
            }
        }
    };

    let order = match request.sort {
        Sort::NewestFirst => format!("{} DESC", table.time_column),
        Sort::OldestFirst => format!("{} ASC", table.time_column),
        Sort::MostImportant if table.has_importance => {
            format!("importance DESC, {} DESC", table.time_column)
        }
        Sort::MostImportant => format!("{} DESC", table.time_column),
    };

    let mut sql = format!("SELECT * FROM {}", table.name);
    if let Some(clause) = where_clause {
        sql.push_str(&format!(" WHERE {clause}"));
    }
    sql.push_str(&format!(" ORDER BY {order}, id"));
    if let Some(limit) = request.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok((sql, values))
}

/// `column IN (?a, ?b, ...)`, or a false clause for an empty list.
fn in_clause(column: &str, ids: &[String], values: &mut Vec<Value>) -> String {
    if ids.is_empty() {
        return "0".to_string();
    }
    let placeholders: Vec<String> = ids
        .iter()
        .map(|id| {
            values.push(Value::Text(id.clone()));
            format!("?{}", values.len())
        })
        .collect();
    format!("{column} IN ({})", placeholders.join(", "))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn map_row(kind: RecordKind, row: &Row) -> rusqlite::Result<MemoryRecord> {
    let record = match kind {
        RecordKind::ShortTerm => MemoryRecord::ShortTerm(ShortTermMemory {
            id: row.get("id")?,
            content: row.get("content")?,
            memory_type: {
                let raw: String = row.get("memory_type")?;
                raw.parse()
                    .map_err(|e: String| conversion_error(row, "memory_type", e.into()))?
            },
            importance: row.get("importance")?,
            timestamp: timestamp(row, "timestamp")?,
            access_count: row.get("access_count")?,
            related_entity_ids: string_list(row, "related_entity_ids")?,
            context_tags: string_list(row, "context_tags")?,
            emotional_weight: row.get("emotional_weight")?,
            embedding: embedding(row)?,
        }),
        RecordKind::LongTerm => MemoryRecord::LongTerm(LongTermMemory {
            id: row.get("id")?,
            content: row.get("content")?,
            summary: row.get("summary")?,
            category: row.get("category")?,
            importance: row.get("importance")?,
            source_stm_ids: string_list(row, "source_stm_ids")?,
            related_entity_ids: string_list(row, "related_entity_ids")?,
            related_concepts: string_list(row, "related_concepts")?,
            retrieval_cues: string_list(row, "retrieval_cues")?,
            created_at: timestamp(row, "created_at")?,
            last_accessed: timestamp(row, "last_accessed")?,
            strength_score: row.get("strength_score")?,
            embedding: embedding(row)?,
        }),
        RecordKind::Episodic => MemoryRecord::Episodic(EpisodicMemory {
            id: row.get("id")?,
            event_description: row.get("event_description")?,
            location: row.get("location")?,
            participants: string_list(row, "participants")?,
            emotional_tone: row.get("emotional_tone")?,
            importance: row.get("importance")?,
            contextual_cues: string_list(row, "contextual_cues")?,
            timestamp: timestamp(row, "timestamp")?,
        }),
        RecordKind::Entity => MemoryRecord::Entity(Entity {
            id: row.get("id")?,
            name: row.get("name")?,
            entity_type: row.get("entity_type")?,
            description: row.get("description")?,
            aliases: string_list(row, "aliases")?,
            tags: string_list(row, "tags")?,
            last_mentioned: timestamp(row, "last_mentioned")?,
            embedding: embedding(row)?,
        }),
        RecordKind::Relationship => MemoryRecord::Relationship(Relationship {
            id: row.get("id")?,
            subject_id: row.get("subject_id")?,
            predicate: row.get("predicate")?,
            object_id: row.get("object_id")?,
            created_at: timestamp(row, "created_at")?,
        }),
        RecordKind::Note => MemoryRecord::Note(Note {
            id: row.get("id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            tags: string_list(row, "tags")?,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        }),
        RecordKind::Interaction => MemoryRecord::Interaction(InteractionRecord {
            id: row.get("id")?,
            query: row.get("query")?,
            response: row.get("response")?,
            intent: row.get("intent")?,
            privacy_level: row.get("privacy_level")?,
            confidence: row.get("confidence")?,
            model_used: row.get("model_used")?,
            actions: {
                let raw: String = row.get("actions")?;
                serde_json::from_str(&raw)
                    .map_err(|e| conversion_error(row, "actions", Box::new(e)))?
            },
            timestamp: timestamp(row, "timestamp")?,
        }),
    };
    Ok(record)
}

fn conversion_error(
    row: &Row,
    column: &str,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err)
}

fn timestamp(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_timestamp(&raw).map_err(|e| conversion_error(row, column, Box::new(e)))
}

fn string_list(row: &Row, column: &str) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(row, column, Box::new(e)))
}

fn embedding(row: &Row) -> rusqlite::Result<Option<Embedding>> {
    let bytes: Option<Vec<u8>> = row.get("embedding")?;
    let Some(bytes) = bytes else {
        return Ok(None);
    };
    let generated_at = match row.get::<_, Option<String>>("embedded_at")? {
        Some(raw) => parse_timestamp(&raw)
            .map_err(|e| conversion_error(row, "embedded_at", Box::new(e)))?,
        None => DateTime::<Utc>::MIN_UTC,
    };
    Ok(Some(Embedding {
        vector: bytes_to_embedding(&bytes),
        generated_at,
    }))
}

/// Fixed-width RFC 3339 so lexicographic order matches time order.
pub(crate) fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc))
}

// ── Insert ───────────────────────────────────────────────────────────────────

fn json_list(list: &[String]) -> Result<String> {
    Ok(serde_json::to_string(list)?)
}

fn embedding_columns(embedding: &Option<Embedding>) -> (Option<Vec<u8>>, Option<String>) {
    match embedding {
        Some(e) => (
            Some(embedding_to_bytes(&e.vector)),
            Some(format_timestamp(e.generated_at)),
        ),
        None => (None, None),
    }
}

fn insert_record(conn: &Connection, record: &MemoryRecord) -> Result<()> {
    match record {
        MemoryRecord::ShortTerm(m) => {
            let (embedding, embedded_at) = embedding_columns(&m.embedding);
            conn.execute(
                "INSERT OR REPLACE INTO short_term_memories \
                 (id, content, memory_type, importance, timestamp, access_count, \
                  related_entity_ids, context_tags, emotional_weight, embedding, embedded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    m.id,
                    m.content,
                    m.memory_type.as_str(),
                    m.importance,
                    format_timestamp(m.timestamp),
                    m.access_count,
                    json_list(&m.related_entity_ids)?,
                    json_list(&m.context_tags)?,
                    m.emotional_weight,
                    embedding,
                    embedded_at,
                ],
            )?;
        }
        MemoryRecord::LongTerm(m) => {
            let (embedding, embedded_at) = embedding_columns(&m.embedding);
            conn.execute(
                "INSERT OR REPLACE INTO long_term_memories \
                 (id, content, summary, category, importance, source_stm_ids, related_entity_ids, \
                  related_concepts, retrieval_cues, created_at, last_accessed, strength_score, \
                  embedding, embedded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    m.id,
                    m.content,
                    m.summary,
                    m.category,
                    m.importance,
                    json_list(&m.source_stm_ids)?,
                    json_list(&m.related_entity_ids)?,
                    json_list(&m.related_concepts)?,
                    json_list(&m.retrieval_cues)?,
                    format_timestamp(m.created_at),
                    format_timestamp(m.last_accessed),
                    m.strength_score,
                    embedding,
                    embedded_at,
                ],
            )?;
        }
        MemoryRecord::Episodic(m) => {
            conn.execute(
                "INSERT OR REPLACE INTO episodic_memories \
                 (id, event_description, location, participants, emotional_tone, importance, \
                  contextual_cues, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    m.id,
                    m.event_description,
                    m.location,
                    json_list(&m.participants)?,
                    m.emotional_tone,
                    m.importance,
                    json_list(&m.contextual_cues)?,
                    format_timestamp(m.timestamp),
                ],
            )?;
        }
        MemoryRecord::Entity(e) => {
            let (embedding, embedded_at) = embedding_columns(&e.embedding);
            conn.execute(
                "INSERT OR REPLACE INTO entities \
                 (id, name, entity_type, description, aliases, tags, last_mentioned, \
                  embedding, embedded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    e.id,
                    e.name,
                    e.entity_type,
                    e.description,
                    json_list(&e.aliases)?,
                    json_list(&e.tags)?,
                    format_timestamp(e.last_mentioned),
                    embedding,
                    embedded_at,
                ],
            )?;
        }
        MemoryRecord::Relationship(r) => {
            conn.execute(
                "INSERT OR REPLACE INTO relationships (id, subject_id, predicate, object_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    r.id,
                    r.subject_id,
                    r.predicate,
                    r.object_id,
                    format_timestamp(r.created_at),
                ],
            )?;
        }
        MemoryRecord::Note(n) => {
            conn.execute(
                "INSERT OR REPLACE INTO notes (id, title, content, tags, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    n.id,
                    n.title,
                    n.content,
                    json_list(&n.tags)?,
                    format_timestamp(n.created_at),
                    format_timestamp(n.updated_at),
                ],
            )?;
        }
        MemoryRecord::Interaction(i) => {
            conn.execute(
                "INSERT OR REPLACE INTO interactions \
                 (id, query, response, intent, privacy_level, confidence, model_used, actions, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    i.id,
                    i.query,
                    i.response,
                    i.intent,
                    i.privacy_level,
                    i.confidence,
                    i.model_used,
                    serde_json::to_string(&i.actions)?,
                    format_timestamp(i.timestamp),
                ],
            )?;
        }
    }
    Ok(())
}

// ── Delete ───────────────────────────────────────────────────────────────────

fn delete_record(conn: &mut Connection, kind: RecordKind, id: &str) -> Result<bool> {
    let tx = conn.transaction()?;
    let deleted = delete_in(&tx, kind, id)?;
    tx.commit()?;
    Ok(deleted)
}

fn delete_in(tx: &Transaction, kind: RecordKind, id: &str) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table(kind).name);
    let deleted = tx.execute(&sql, params![id])? > 0;

    if kind == RecordKind::Entity && deleted {
        tx.execute(
            "DELETE FROM relationships WHERE subject_id = ?1 OR object_id = ?1",
            params![id],
        )?;
        scrub_entity_references(tx, "short_term_memories", id)?;
        scrub_entity_references(tx, "long_term_memories", id)?;
    }
    Ok(deleted)
}

// ── Batch ────────────────────────────────────────────────────────────────────

/// Run a batch in one transaction. Dropping the transaction on an error
/// rolls back every earlier mutation of the batch.
fn apply_batch(conn: &mut Connection, batch: &[Mutation]) -> Result<()> {
    let tx = conn.transaction()?;
    for mutation in batch {
        match mutation {
            Mutation::Insert(record) => insert_record(&tx, record)?,
            Mutation::Delete(kind, id) => {
                delete_in(&tx, *kind, id)?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Remove `entity_id` from every `related_entity_ids` list in `table_name`.
fn scrub_entity_references(tx: &Transaction, table_name: &str, entity_id: &str) -> Result<usize> {
    let pattern = format!("%\"{}\"%", escape_like(entity_id));
    let rows: Vec<(String, String)> = {
        let sql = format!(
            "SELECT id, related_entity_ids FROM {table_name} \
             WHERE related_entity_ids LIKE ?1 ESCAPE '\\'"
        );
        let mut stmt = tx.prepare(&sql)?;
        let collected = stmt
            .query_map(params![pattern], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    let update = format!("UPDATE {table_name} SET related_entity_ids = ?1 WHERE id = ?2");
    for (id, raw) in &rows {
        let mut ids: Vec<String> = serde_json::from_str(raw)?;
        ids.retain(|e| e != entity_id);
        tx.execute(&update, params![json_list(&ids)?, id])?;
    }

    if !rows.is_empty() {
        tracing::debug!(table = table_name, entity_id, scrubbed = rows.len(), "entity references removed");
    }
    Ok(rows.len())
}

// ── Touch ────────────────────────────────────────────────────────────────────

fn touch_records(conn: &Connection, kind: RecordKind, ids: &[String]) -> Result<()> {
    let mut values: Vec<Value> = Vec::new();
    let sql = match kind {
        RecordKind::ShortTerm => {
            let clause = in_clause("id", ids, &mut values);
            format!("UPDATE short_term_memories SET access_count = access_count + 1 WHERE {clause}")
        }
        RecordKind::LongTerm => {
            values.push(Value::Text(format_timestamp(Utc::now())));
            let clause = in_clause("id", ids, &mut values);
            format!("UPDATE long_term_memories SET last_accessed = ?1 WHERE {clause}")
        }
        _ => return Ok(()),
    };
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}
