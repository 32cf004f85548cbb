//! Debounced interactive queries.
//!
//! While a note is being edited, every keystroke may produce a new query.
//! [`QueryDebouncer::submit`] waits a short delay before answering, and a
//! newer submission for the same session cancels the pending one. The
//! superseded call drops its in-flight retrieval or generation and returns
//! [`Debounced::Superseded`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent::{Agent, AgentResponse};
use crate::error::AgentError;

#[derive(Debug, Clone, PartialEq)]
pub enum Debounced<T> {
    Ready(T),
    /// A newer submission for the same session replaced this one.
    Superseded,
}

impl<T> Debounced<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Superseded => None,
        }
    }
}

/// Latest-wins gate keyed by session id.
#[derive(Default)]
struct LatestWins {
    pending: Mutex<HashMap<String, (u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl LatestWins {
    async fn run<F, Fut, T>(&self, session: &str, delay: Duration, job: F) -> Debounced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((_, previous)) =
                pending.insert(session.to_string(), (generation, token.clone()))
            {
                previous.cancel();
            }
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                debug!(session, "query superseded");
                Debounced::Superseded
            }
            value = async {
                tokio::time::sleep(delay).await;
                job().await
            } => Debounced::Ready(value),
        };

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.get(session).is_some_and(|(g, _)| *g == generation) {
            pending.remove(session);
        }
        outcome
    }

    fn pending_sessions(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }
}

pub struct QueryDebouncer {
    agent: Arc<Agent>,
    delay: Duration,
    gate: LatestWins,
}

impl QueryDebouncer {
    pub fn new(agent: Arc<Agent>, delay: Duration) -> Self {
        Self {
            agent,
            delay,
            gate: LatestWins::default(),
        }
    }

    /// Answer `query` for `session` unless a newer query arrives first.
    pub async fn submit(
        &self,
        session: &str,
        query: &str,
    ) -> Result<Debounced<AgentResponse>, AgentError> {
        match self
            .gate
            .run(session, self.delay, || self.agent.query(query))
            .await
        {
            Debounced::Ready(result) => result.map(Debounced::Ready),
            Debounced::Superseded => Ok(Debounced::Superseded),
        }
    }

    /// Sessions with a query still waiting or running.
    pub fn pending_sessions(&self) -> usize {
        self.gate.pending_sessions()
    }
}
