//! Perception, reasoning and action loop around an [`Agent`].
//!
//! Each call to [`Orchestrator::process_query`] runs one cycle under the
//! cycle lock, so cycles and insight reviews never interleave and the
//! insight list and history have a single writer. State changes are
//! published on a `watch` channel and broadcast as [`OrchestratorEvent`]s;
//! both work with no subscriber attached.

pub mod action;
pub mod insights;
pub mod perception;
pub mod reasoning;
pub mod state;

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::agent::{ActionKind, Agent, AgentResponse, AutonomousAction};
use crate::config::{EngramConfig, OrchestratorConfig, MAX_INTERVAL_SECONDS};
use crate::error::AgentError;
use crate::memory::types::new_id;
use crate::memory::{InteractionRecord, SearchMode};
use crate::privacy::PrivacyLevel;
use crate::scheduler::Scheduler;

use action::ActionReport;
use insights::{Insight, InsightLog};
use perception::{classify_intent, detect_triggers, Intent, Perception, SystemSnapshot};
use reasoning::{recommend, QualityEstimate, Reasoning};

pub use state::{OrchestratorEvent, OrchestratorState};

const EVENT_CAPACITY: usize = 64;

/// Summary of a completed cycle, kept in the bounded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub id: String,
    pub query: String,
    pub intent: Intent,
    pub privacy_level: PrivacyLevel,
    pub search_mode: SearchMode,
    pub confidence: f64,
    pub quality: f64,
    pub actions: Vec<AutonomousAction>,
    pub completed_at: DateTime<Utc>,
}

/// State owned by the holder of the cycle lock.
struct CycleState {
    history: VecDeque<CycleRecord>,
    insights: InsightLog,
}

pub struct Orchestrator {
    agent: Arc<Agent>,
    config: OrchestratorConfig,
    action_threshold: f64,
    consolidation_interval: Duration,
    state: watch::Sender<OrchestratorState>,
    insights: watch::Sender<Vec<Insight>>,
    events: broadcast::Sender<OrchestratorEvent>,
    cycle: Mutex<CycleState>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl Orchestrator {
    pub fn new(agent: Arc<Agent>, config: &EngramConfig) -> Self {
        let (state, _) = watch::channel(OrchestratorState::Idle);
        let (insights, _) = watch::channel(Vec::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            agent,
            action_threshold: config.agent.action_confidence_threshold,
            consolidation_interval: Duration::from_secs(
                config.agent.consolidation_interval_seconds.clamp(1, MAX_INTERVAL_SECONDS),
            ),
            state,
            insights,
            events,
            cycle: Mutex::new(CycleState {
                history: VecDeque::new(),
                insights: InsightLog::new(config.orchestrator.max_insights),
            }),
            scheduler: Mutex::new(None),
            config: config.orchestrator.clone(),
        }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    pub fn subscribe_insights(&self) -> watch::Receiver<Vec<Insight>> {
        self.insights.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn insights(&self) -> Vec<Insight> {
        self.insights.borrow().clone()
    }

    /// Completed cycles, oldest first.
    pub async fn history(&self) -> Vec<CycleRecord> {
        self.cycle.lock().await.history.iter().cloned().collect()
    }

    fn set_state(&self, to: OrchestratorState) {
        let from = self.state.send_replace(to);
        if from != to {
            debug!(%from, %to, "orchestrator state changed");
            self.emit(OrchestratorEvent::StateChanged { from, to });
        }
    }

    /// End a cycle. A `stop` that began mid-cycle keeps its `stopping` state.
    fn leave_processing(&self, to: OrchestratorState) {
        if self.state() == OrchestratorState::Processing {
            self.set_state(to);
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        // An error only means nobody is listening.
        let _ = self.events.send(event);
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Initialize the agent and start the background schedule
    /// (consolidation sweep and insight review). A no-op when already running.
    pub async fn start(self: &Arc<Self>) -> Result<(), AgentError> {
        let mut scheduler_slot = self.scheduler.lock().await;
        if scheduler_slot.is_some() {
            return Ok(());
        }

        self.set_state(OrchestratorState::Initializing);
        if let Err(e) = self.agent.initialize().await {
            error!(error = %e, "orchestrator failed to start");
            self.set_state(OrchestratorState::Error);
            return Err(e);
        }

        let mut scheduler = Scheduler::new();
        if self.agent.config().enable_consolidation {
            let agent = self.agent.clone();
            scheduler.spawn_periodic("consolidation", self.consolidation_interval, move || {
                let agent = agent.clone();
                async move {
                    if let Err(e) = agent.consolidate_now().await {
                        warn!(error = %e, "scheduled consolidation failed");
                    }
                }
            });
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let insight_period =
            Duration::from_secs(self.config.insight_interval_seconds.clamp(1, MAX_INTERVAL_SECONDS));
        scheduler.spawn_periodic("insights", insight_period, move || {
            let weak = weak.clone();
            async move {
                let Some(orchestrator) = weak.upgrade() else {
                    return;
                };
                if let Err(e) = orchestrator.generate_insights().await {
                    warn!(error = %e, "scheduled insight review failed");
                }
            }
        });

        *scheduler_slot = Some(scheduler);
        self.set_state(OrchestratorState::Active);
        info!("orchestrator started");
        Ok(())
    }

    /// Stop the background schedule, flush the store and return to `idle`.
    /// Waits for an in-flight cycle to finish.
    pub async fn stop(&self) {
        let scheduler = self.scheduler.lock().await.take();
        self.set_state(OrchestratorState::Stopping);
        // Scheduled jobs take the cycle lock themselves, so stop them first.
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }

        let _cycle = self.cycle.lock().await;
        if let Err(e) = self.agent.save().await {
            warn!(error = %e, "failed to flush memory store on stop");
        }
        self.set_state(OrchestratorState::Idle);
        info!("orchestrator stopped");
    }

    // ── Cycle ────────────────────────────────────────────────────────────────

    /// Run one perception, reasoning and action cycle for `query`.
    ///
    /// The returned response lists the autonomous actions that ran. On a
    /// recoverable error the orchestrator returns to `active`; otherwise it
    /// moves to `error` until a later cycle succeeds.
    ///
    /// Fails with [`AgentError::NotInitialized`] unless the orchestrator has
    /// been started and not stopped since.
    pub async fn process_query(&self, query: &str) -> Result<AgentResponse, AgentError> {
        let mut cycle = self.cycle.lock().await;
        let current = self.state();
        if !current.accepts_queries() {
            debug!(state = %current, "query rejected");
            return Err(AgentError::NotInitialized);
        }
        self.set_state(OrchestratorState::Processing);

        match self.run_cycle(query, &mut cycle).await {
            Ok(response) => {
                self.leave_processing(OrchestratorState::Active);
                self.emit(OrchestratorEvent::CycleCompleted {
                    query: query.to_string(),
                    confidence: response.confidence,
                    actions: response.autonomous_actions.len(),
                });
                Ok(response)
            }
            Err(e) => {
                let next = if e.is_recoverable() {
                    OrchestratorState::Active
                } else {
                    OrchestratorState::Error
                };
                warn!(error = %e, state = %next, "cycle failed");
                self.leave_processing(next);
                self.emit(OrchestratorEvent::CycleFailed {
                    query: query.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, query: &str, cycle: &mut CycleState) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();

        let perception = self.perceive(query).await?;
        debug!(
            intent = %perception.intent,
            privacy = %perception.privacy.level,
            triggers = perception.triggers.len(),
            "perception complete"
        );

        let reasoning = self.reason(&perception).await?;
        let report = self.act(&perception, &reasoning).await;
        self.persist(&perception, &reasoning, &report).await?;

        cycle.insights.merge(reasoning.insights.clone());
        let published = cycle.insights.to_vec();
        let count = published.len();
        self.insights.send_replace(published);
        self.emit(OrchestratorEvent::InsightsUpdated { count });

        cycle.history.push_back(CycleRecord {
            id: new_id(),
            query: query.to_string(),
            intent: perception.intent,
            privacy_level: perception.privacy.level,
            search_mode: perception.context.search_mode,
            confidence: reasoning.response.confidence,
            quality: reasoning.quality.overall,
            actions: report.executed.clone(),
            completed_at: Utc::now(),
        });
        while cycle.history.len() > self.config.history_limit {
            cycle.history.pop_front();
        }

        let mut response = reasoning.response;
        response.autonomous_actions = report.executed;
        response.processing_time_seconds = started.elapsed().as_secs_f64();
        info!(
            intent = %perception.intent,
            confidence = response.confidence,
            actions = response.autonomous_actions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );
        Ok(response)
    }

    async fn perceive(&self, query: &str) -> Result<Perception, AgentError> {
        let context = self.agent.retrieve(query).await?;
        let privacy = self.agent.analyze_privacy(query, Some(&context));
        let snapshot = SystemSnapshot::new(self.agent.counts().await?);
        let intent = classify_intent(query);
        let triggers = detect_triggers(query, &context, &snapshot, &self.config);
        Ok(Perception {
            query: query.to_string(),
            context,
            privacy,
            snapshot,
            intent,
            triggers,
        })
    }

    async fn reason(&self, perception: &Perception) -> Result<Reasoning, AgentError> {
        let response = self.agent.respond(&perception.context, &perception.privacy).await?;
        let quality = QualityEstimate::estimate(&response);
        let recommendations = recommend(perception, &self.config);
        let insights = insights::from_perception(perception);
        Ok(Reasoning {
            response,
            quality,
            recommendations,
            insights,
        })
    }

    async fn act(&self, perception: &Perception, reasoning: &Reasoning) -> ActionReport {
        let mut report = ActionReport {
            delivered: true,
            executed: Vec::new(),
            skipped: Vec::new(),
        };
        for recommendation in &reasoning.recommendations {
            if recommendation.confidence >= self.action_threshold {
                let outcome = action::execute(&self.agent, recommendation, perception).await;
                self.emit(OrchestratorEvent::ActionExecuted(outcome.clone()));
                if outcome.kind == ActionKind::Notification && outcome.success {
                    self.emit(OrchestratorEvent::Notification {
                        message: outcome.detail.clone(),
                    });
                }
                report.executed.push(outcome);
            } else {
                debug!(
                    action = recommendation.kind.as_str(),
                    confidence = recommendation.confidence,
                    threshold = self.action_threshold,
                    "recommendation below threshold"
                );
                report.skipped.push(recommendation.clone());
            }
        }
        report
    }

    /// Store the learning record and the interaction memories in one batch.
    async fn persist(
        &self,
        perception: &Perception,
        reasoning: &Reasoning,
        report: &ActionReport,
    ) -> Result<(), AgentError> {
        let actions = serde_json::json!({
            "perception": {
                "intent": perception.intent,
                "privacy_score": perception.privacy.score,
                "triggers": perception.triggers,
                "retrieved": perception.context.total_items(),
                "search_mode": perception.context.search_mode,
            },
            "reasoning": {
                "quality": reasoning.quality,
                "recommendations": reasoning.recommendations,
            },
            "actions": report,
        });

        let response = &reasoning.response;
        let record = InteractionRecord {
            id: new_id(),
            query: perception.query.clone(),
            response: response.content.clone(),
            intent: perception.intent.as_str().to_string(),
            privacy_level: perception.privacy.level.as_str().to_string(),
            confidence: response.confidence,
            model_used: response.model_used.clone(),
            actions,
            timestamp: Utc::now(),
        };
        self.agent.store_learning_record(record).await?;
        Ok(())
    }

    // ── Insights ─────────────────────────────────────────────────────────────

    /// Review counts and recent cycles, merge the findings into the insight
    /// list and return them.
    pub async fn generate_insights(&self) -> Result<Vec<Insight>, AgentError> {
        let mut cycle = self.cycle.lock().await;
        let snapshot = SystemSnapshot::new(self.agent.counts().await?);
        let found = insights::periodic(&snapshot, &cycle.history, self.config.stm_backlog_threshold);

        if !found.is_empty() {
            cycle.insights.merge(found.clone());
            let published = cycle.insights.to_vec();
            let count = published.len();
            self.insights.send_replace(published);
            self.emit(OrchestratorEvent::InsightsUpdated { count });
        }
        debug!(found = found.len(), "insight review complete");
        Ok(found)
    }
}
