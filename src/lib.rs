//! Memory retrieval and decision core for a personal notes app.
//!
//! Engram decides what a notes assistant remembers, what it recalls for a
//! question, and what may leave the device. Memories are kept as several
//! record kinds with different lifecycles:
//!
//! | Kind | Purpose | Lifecycle |
//! |------|---------|-----------|
//! | **Short-term** | Fresh fragments from notes, transcriptions, interactions | Promoted or expired after 24h |
//! | **Long-term** | Consolidated, durable knowledge | Never auto-expired |
//! | **Episodic** | Specific events and interactions | Immutable |
//! | **Entity** / **Relationship** | People, places, projects and links between them | Updated on mention |
//! | **Note** | User-authored notes | Kept as written |
//!
//! # Architecture
//!
//! - **Storage**: SQLite behind the [`memory::MemoryStore`] trait, one table per record kind
//! - **Retrieval**: keyword and recency ranking, hybrid with embedding similarity when an
//!   [`embedding::EmbeddingProvider`] is injected
//! - **Privacy**: four-tier classification gating which context an off-device
//!   [`provider::ResponseProvider`] may see
//! - **Orchestration**: a perception, reasoning and action cycle that can run follow-up work
//!   on its own, plus a [`scheduler::Scheduler`] for periodic consolidation and insight review
//!
//! # Modules
//!
//! - [`agent`]: ingestion, query answering, consolidation and graph upkeep
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite schema and the bundled [`db::SqliteMemoryStore`]
//! - [`embedding`]: embedding provider trait and vector math
//! - [`error`]: the [`error::AgentError`] taxonomy
//! - [`memory`]: record types, the store contract and the retrieval context
//! - [`orchestrator`]: the query cycle, state machine, events and insights
//! - [`privacy`]: privacy classification and context redaction
//! - [`provider`]: response provider trait
//! - [`retrieval`]: candidate fetching and ranking
//! - [`scheduler`]: cancellable periodic tasks
//! - [`session`]: debounced interactive queries

pub mod agent;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod privacy;
pub mod provider;
pub mod retrieval;
pub mod scheduler;
pub mod session;
