//! Response generation collaborator.
//!
//! The core never talks to a model directly. A [`ResponseProvider`] receives a
//! fully built prompt plus the (already privacy-filtered) [`MemoryContext`]
//! it was built from, and reports whether it ran on the device.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::MemoryContext;

/// Text produced by a [`ResponseProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub content: String,
    /// Provider's own confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    pub model_used: String,
    pub is_on_device: bool,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait ResponseProvider: Send + Sync {
    async fn generate(&self, prompt: &str, context: &MemoryContext) -> Result<GeneratedResponse>;

    /// `false` while the backend is loading or unreachable.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether prompts stay on the device. Off-device providers only ever
    /// see contexts filtered down to the configured privacy ceiling.
    fn is_on_device(&self) -> bool;
}
