#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use engram::agent::Agent;
use engram::config::EngramConfig;
use engram::db::SqliteMemoryStore;
use engram::embedding::EmbeddingProvider;
use engram::memory::{
    FetchRequest, MemoryContext, MemoryRecord, MemoryStore, MemoryType, Mutation, RecordKind,
    ShortTermMemory,
};
use engram::provider::{GeneratedResponse, ResponseProvider};

pub const TEST_DIMENSIONS: usize = 16;

/// Fresh in-memory store with the schema applied.
pub fn test_store() -> Arc<SqliteMemoryStore> {
    Arc::new(SqliteMemoryStore::open_in_memory().unwrap())
}

/// Build and initialize an agent over `store`.
pub async fn test_agent(
    store: Arc<SqliteMemoryStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    provider: Option<Arc<dyn ResponseProvider>>,
    config: &EngramConfig,
) -> Arc<Agent> {
    let agent = Agent::new(store, embedder, provider, config);
    agent.initialize().await.unwrap();
    Arc::new(agent)
}

/// Insert a short-term memory created `age_hours` ago. Returns its id.
pub async fn insert_stm(
    store: &SqliteMemoryStore,
    content: &str,
    importance: f64,
    age_hours: i64,
) -> String {
    let mut stm = ShortTermMemory::new(content, MemoryType::Semantic, importance);
    stm.timestamp = Utc::now() - Duration::hours(age_hours);
    let id = stm.id.clone();
    store.insert(stm.into()).await.unwrap();
    id
}

pub async fn count(store: &SqliteMemoryStore, kind: RecordKind) -> usize {
    store.count(kind).await.unwrap()
}

/// Deterministic bag-of-words embedding: each word adds weight to one of
/// [`TEST_DIMENSIONS`] buckets, so texts sharing words point the same way.
pub fn test_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % TEST_DIMENSIONS] += 1.0;
    }
    v
}

/// Embedding provider backed by [`test_embedding`].
#[derive(Default)]
pub struct MockEmbedder {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let embedder = Self::default();
        embedder.failing.store(true, Ordering::SeqCst);
        embedder
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("embedding model not loaded"));
        }
        Ok(test_embedding(text))
    }

    fn dimensions(&self) -> usize {
        TEST_DIMENSIONS
    }
}

/// Response provider that pops scripted replies from a FIFO queue.
///
/// `Err` entries make `generate` fail. When the queue is empty the
/// provider answers `"mock response"`.
pub struct MockResponder {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    contexts: Mutex<Vec<MemoryContext>>,
    on_device: bool,
    available: AtomicBool,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::with_replies(Vec::<&str>::new())
    }

    pub fn with_replies<S: Into<String>>(replies: Vec<S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
            on_device: true,
            available: AtomicBool::new(true),
        }
    }

    /// Fails every call until replies are queued.
    pub fn failing() -> Self {
        let responder = Self::new();
        responder
            .replies
            .try_lock()
            .unwrap()
            .extend((0..64).map(|_| Err("model crashed".to_string())));
        responder
    }

    pub fn off_device(mut self) -> Self {
        self.on_device = false;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn push_reply(&self, reply: &str) {
        self.replies.lock().await.push_back(Ok(reply.to_string()));
    }

    pub async fn push_failure(&self, reason: &str) {
        self.replies.lock().await.push_back(Err(reason.to_string()));
    }

    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Contexts passed to `generate`, in call order.
    pub async fn contexts(&self) -> Vec<MemoryContext> {
        self.contexts.lock().await.clone()
    }
}

#[async_trait]
impl ResponseProvider for MockResponder {
    async fn generate(&self, prompt: &str, context: &MemoryContext) -> Result<GeneratedResponse> {
        self.prompts.lock().await.push(prompt.to_string());
        self.contexts.lock().await.push(context.clone());
        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("mock response".to_string()));
        match reply {
            Ok(content) => Ok(GeneratedResponse {
                content,
                confidence: 0.9,
                model_used: "mock-model".into(),
                is_on_device: self.on_device,
                tokens_used: Some(20),
            }),
            Err(reason) => Err(anyhow!(reason)),
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn is_on_device(&self) -> bool {
        self.on_device
    }
}

/// Store whose reads fail and whose writes succeed without effect.
pub struct BrokenStore;

#[async_trait]
impl MemoryStore for BrokenStore {
    async fn fetch(&self, _request: FetchRequest) -> Result<Vec<MemoryRecord>> {
        Err(anyhow!("disk I/O error"))
    }

    async fn insert(&self, _record: MemoryRecord) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _kind: RecordKind, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn apply(&self, _batch: Vec<Mutation>) -> Result<()> {
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self, _kind: RecordKind) -> Result<usize> {
        Ok(0)
    }

    async fn touch(&self, _kind: RecordKind, _ids: &[String]) -> Result<()> {
        Ok(())
    }
}

/// SQLite store whose deletes can be switched off. A batch containing a
/// delete is refused as a whole while deletes are off.
pub struct DeleteRefusingStore {
    inner: Arc<SqliteMemoryStore>,
    refuse: AtomicBool,
}

impl DeleteRefusingStore {
    pub fn new(inner: Arc<SqliteMemoryStore>) -> Self {
        Self {
            inner,
            refuse: AtomicBool::new(true),
        }
    }

    pub fn allow_deletes(&self) {
        self.refuse.store(false, Ordering::SeqCst);
    }

    fn refusing(&self) -> bool {
        self.refuse.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MemoryStore for DeleteRefusingStore {
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<MemoryRecord>> {
        self.inner.fetch(request).await
    }

    async fn insert(&self, record: MemoryRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<bool> {
        if self.refusing() {
            return Err(anyhow!("database is locked"));
        }
        self.inner.delete(kind, id).await
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<()> {
        if self.refusing() && batch.iter().any(|m| matches!(m, Mutation::Delete(..))) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.apply(batch).await
    }

    async fn save(&self) -> Result<()> {
        self.inner.save().await
    }

    async fn count(&self, kind: RecordKind) -> Result<usize> {
        self.inner.count(kind).await
    }

    async fn touch(&self, kind: RecordKind, ids: &[String]) -> Result<()> {
        self.inner.touch(kind, ids).await
    }
}
