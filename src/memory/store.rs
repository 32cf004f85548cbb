//! The [`MemoryStore`] collaborator contract.
//!
//! Stores hold every [`RecordKind`] and answer filtered, sorted, limited
//! fetches. Predicates are deliberately simple: a store is only required to
//! evaluate up to [`MAX_PREDICATE_TERMS`] OR-ed containment terms, and callers
//! with longer term lists fetch broadly and filter in memory instead.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{MemoryRecord, Record, RecordKind};

/// Maximum OR-ed terms a [`Filter::ContainsAny`] may carry.
pub const MAX_PREDICATE_TERMS: usize = 2;

/// Row selection for a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Any searchable field of the kind contains any of the terms (case-insensitive).
    ContainsAny(Vec<String>),
    /// Timestamp strictly before the given instant.
    OlderThan(DateTime<Utc>),
    Ids(Vec<String>),
    /// Relationships naming any of the given entity ids. Other kinds match nothing.
    InvolvesEntities(Vec<String>),
}

/// Result ordering for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    NewestFirst,
    OldestFirst,
    /// Highest importance first; kinds without importance fall back to newest first.
    MostImportant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub kind: RecordKind,
    pub filter: Filter,
    pub sort: Sort,
    pub limit: Option<usize>,
}

impl FetchRequest {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            filter: Filter::All,
            sort: Sort::NewestFirst,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One write in a batch passed to [`MemoryStore::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(MemoryRecord),
    Delete(RecordKind, String),
}

impl Mutation {
    pub fn insert(record: impl Into<MemoryRecord>) -> Self {
        Self::Insert(record.into())
    }

    pub fn delete(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::Delete(kind, id.into())
    }
}

/// Persistent, queryable collection of typed memory records.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<MemoryRecord>>;

    /// Insert a record, replacing any existing record with the same id.
    async fn insert(&self, record: MemoryRecord) -> Result<()>;

    /// Delete a record. Returns `false` if it did not exist.
    ///
    /// Deleting an entity also removes it from every `related_entity_ids`
    /// list and deletes every relationship naming it.
    async fn delete(&self, kind: RecordKind, id: &str) -> Result<bool>;

    /// Apply every mutation in order, or none of them.
    async fn apply(&self, batch: Vec<Mutation>) -> Result<()>;

    /// Flush pending writes to durable storage.
    async fn save(&self) -> Result<()>;

    async fn count(&self, kind: RecordKind) -> Result<usize>;

    /// Record an access: bumps `access_count` for short-term memories and
    /// `last_accessed` for long-term memories. Other kinds are ignored.
    async fn touch(&self, kind: RecordKind, ids: &[String]) -> Result<()>;
}

/// Typed fetch: `request.kind` is overridden with `T::KIND`.
pub async fn fetch_as<T: Record>(store: &dyn MemoryStore, request: FetchRequest) -> Result<Vec<T>> {
    let request = FetchRequest {
        kind: T::KIND,
        ..request
    };
    let records = store.fetch(request).await?;
    Ok(records.into_iter().filter_map(T::from_record).collect())
}

/// Look up a single record by id.
pub async fn get_as<T: Record>(store: &dyn MemoryStore, id: &str) -> Result<Option<T>> {
    let request = FetchRequest::new(T::KIND)
        .filter(Filter::Ids(vec![id.to_string()]))
        .limit(1);
    Ok(fetch_as::<T>(store, request).await?.into_iter().next())
}
