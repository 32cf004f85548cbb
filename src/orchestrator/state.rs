use serde::Serialize;

use crate::agent::AutonomousAction;

/// Lifecycle of an [`Orchestrator`](super::Orchestrator).
///
/// `idle -> initializing -> active <-> processing -> stopping -> idle`, with
/// `error` reachable from initialization and from unrecoverable cycle
/// failures. A later successful cycle returns `error` to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Initializing,
    Active,
    Processing,
    Stopping,
    Error,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Processing => "processing",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }

    /// States from which a new cycle may start. `error` is included so a
    /// successful cycle can recover.
    pub fn accepts_queries(&self) -> bool {
        matches!(self, Self::Active | Self::Error)
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast to every subscriber. Nothing requires a subscriber to exist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    StateChanged {
        from: OrchestratorState,
        to: OrchestratorState,
    },
    CycleCompleted {
        query: String,
        confidence: f64,
        actions: usize,
    },
    CycleFailed {
        query: String,
        error: String,
    },
    ActionExecuted(AutonomousAction),
    /// A task was noted for the user.
    Notification {
        message: String,
    },
    InsightsUpdated {
        count: usize,
    },
}
