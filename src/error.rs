//! Error taxonomy for agent and orchestrator operations.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Operation invoked before startup completed.
    #[error("agent is not initialized")]
    NotInitialized,

    /// A required provider is missing or not ready.
    #[error("{provider} provider is unavailable")]
    ProviderUnavailable { provider: &'static str },

    /// A store fetch failed; the query was aborted.
    #[error("retrieval failed: {source}")]
    RetrievalFailed { source: BoxError },

    /// Consolidation of a single short-term memory failed.
    #[error("consolidation failed for {id}: {reason}")]
    ConsolidationFailed { id: String, reason: String },

    /// The response provider returned an error.
    #[error("response generation failed: {source}")]
    GenerationFailed { source: BoxError },

    /// A write to the memory store failed.
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AgentError {
    pub fn retrieval(err: anyhow::Error) -> Self {
        Self::RetrievalFailed { source: err.into() }
    }

    pub fn generation(err: anyhow::Error) -> Self {
        Self::GenerationFailed { source: err.into() }
    }

    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage { source: err.into() }
    }

    /// Whether the orchestrator may return to `active` after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. }
                | Self::RetrievalFailed { .. }
                | Self::ConsolidationFailed { .. }
                | Self::GenerationFailed { .. }
        )
    }
}
