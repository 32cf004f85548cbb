//! Promote-or-expire sweep over aged short-term memories.
//!
//! Every short-term memory older than the age threshold is either promoted
//! into long-term memory or dropped. There is no "keep" outcome: an item
//! only survives a sweep when deciding on it failed.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::MAX_AGE_DAYS;
use crate::error::AgentError;
use crate::memory::store::fetch_as;
use crate::memory::{
    FetchRequest, Filter, LongTermMemory, MemoryContext, MemoryStore, Mutation, RecordKind,
    ShortTermMemory, Sort,
};
use crate::privacy::{PrivacyAnalyzer, PrivacyLevel};
use crate::provider::ResponseProvider;
use crate::retrieval::scoring::tokenize;

/// Importance at or above which the heuristic promotes.
pub const HEURISTIC_IMPORTANCE: f64 = 0.7;
/// Access count at or above which the heuristic promotes.
pub const HEURISTIC_ACCESS_COUNT: u32 = 3;

const RETRIEVAL_CUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Promote,
    Expire,
}

/// Who made the decisions of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Provider,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub examined: usize,
    pub promoted: usize,
    pub expired: usize,
    pub failures: Vec<ConsolidationFailure>,
    pub decided_by: DecisionSource,
}

impl ConsolidationReport {
    fn new(decided_by: DecisionSource) -> Self {
        Self {
            examined: 0,
            promoted: 0,
            expired: 0,
            failures: Vec::new(),
            decided_by,
        }
    }
}

pub struct ConsolidationEngine {
    store: Arc<dyn MemoryStore>,
    provider: Option<Arc<dyn ResponseProvider>>,
    privacy: PrivacyAnalyzer,
    age_threshold: Duration,
    /// Highest level an off-device provider may decide on.
    cloud_ceiling: PrivacyLevel,
    sweep_lock: Mutex<()>,
}

impl ConsolidationEngine {
    /// `age_hours` is capped at [`MAX_AGE_DAYS`] worth of hours.
    pub fn new(
        store: Arc<dyn MemoryStore>,
        provider: Option<Arc<dyn ResponseProvider>>,
        age_hours: u64,
        cloud_ceiling: PrivacyLevel,
    ) -> Self {
        Self {
            store,
            provider,
            privacy: PrivacyAnalyzer::new(),
            age_threshold: Duration::hours(age_hours.min(MAX_AGE_DAYS * 24) as i64),
            cloud_ceiling,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Run one sweep. Concurrent callers wait for the running sweep to finish.
    ///
    /// Store failures abort the sweep. A provider failure only skips its
    /// item, which stays in short-term memory for the next sweep.
    pub async fn sweep(&self) -> Result<ConsolidationReport, AgentError> {
        let _guard = self.sweep_lock.lock().await;

        let now = Utc::now();
        let provider = self.provider.as_ref().filter(|p| p.is_available());
        let decided_by = match provider {
            Some(_) => DecisionSource::Provider,
            None => DecisionSource::Heuristic,
        };

        let request = FetchRequest::new(RecordKind::ShortTerm)
            .filter(Filter::OlderThan(now - self.age_threshold))
            .sort(Sort::OldestFirst);
        let aged = fetch_as::<ShortTermMemory>(self.store.as_ref(), request)
            .await
            .map_err(AgentError::storage)?;

        let mut report = ConsolidationReport::new(decided_by);
        for stm in aged {
            report.examined += 1;

            let decision = match provider {
                Some(p) if self.provider_may_see(p.as_ref(), &stm) => {
                    match ask_provider(p.as_ref(), &stm, now).await {
                        Ok(decision) => decision,
                        Err(e) => {
                            let err = AgentError::ConsolidationFailed {
                                id: stm.id.clone(),
                                reason: e.to_string(),
                            };
                            warn!(error = %err, "skipping short-term memory");
                            report.failures.push(ConsolidationFailure {
                                id: stm.id,
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    }
                }
                _ => heuristic_decision(&stm),
            };

            // The long-term copy and the short-term delete commit together, so
            // an aborted sweep never leaves a promoted item behind to promote twice.
            let mut batch = Vec::with_capacity(2);
            if decision == Decision::Promote {
                let ltm = promote_to_long_term(&stm, now);
                debug!(stm_id = %stm.id, ltm_id = %ltm.id, "promoting");
                batch.push(Mutation::insert(ltm));
            } else {
                debug!(stm_id = %stm.id, "expiring");
            }
            batch.push(Mutation::delete(RecordKind::ShortTerm, stm.id.as_str()));
            self.store.apply(batch).await.map_err(AgentError::storage)?;

            match decision {
                Decision::Promote => report.promoted += 1,
                Decision::Expire => report.expired += 1,
            }
        }

        if report.examined > 0 {
            self.store.save().await.map_err(AgentError::storage)?;
        }

        info!(
            examined = report.examined,
            promoted = report.promoted,
            expired = report.expired,
            failures = report.failures.len(),
            decided_by = ?report.decided_by,
            "consolidation sweep complete"
        );
        Ok(report)
    }

    /// Off-device providers only decide on items at or below the cloud ceiling.
    fn provider_may_see(&self, provider: &dyn ResponseProvider, stm: &ShortTermMemory) -> bool {
        provider.is_on_device() || self.privacy.level_of(&stm.content) <= self.cloud_ceiling
    }
}

async fn ask_provider(
    provider: &dyn ResponseProvider,
    stm: &ShortTermMemory,
    now: DateTime<Utc>,
) -> Result<Decision> {
    let prompt = decision_prompt(stm, now);
    let mut context = MemoryContext::empty(&stm.content);
    context.short_term.push(stm.clone());
    let reply = provider.generate(&prompt, &context).await?;
    Ok(parse_decision(&reply.content))
}

pub fn decision_prompt(stm: &ShortTermMemory, now: DateTime<Utc>) -> String {
    let age_hours = (now - stm.timestamp).num_hours();
    format!(
        "Decide whether this short-term memory should be kept long term.\n\
         Content: {}\n\
         Type: {}\n\
         Importance: {:.2}\n\
         Accessed: {} times\n\
         Age: {} hours\n\
         Answer PROMOTE to keep it or EXPIRE to forget it.",
        stm.content, stm.memory_type, stm.importance, stm.access_count, age_hours
    )
}

/// `Promote` when the first word of the reply is "promote" in any case.
pub fn parse_decision(reply: &str) -> Decision {
    let first = reply
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or_default();
    if first.eq_ignore_ascii_case("promote") {
        Decision::Promote
    } else {
        Decision::Expire
    }
}

pub fn heuristic_decision(stm: &ShortTermMemory) -> Decision {
    if stm.importance >= HEURISTIC_IMPORTANCE || stm.access_count >= HEURISTIC_ACCESS_COUNT {
        Decision::Promote
    } else {
        Decision::Expire
    }
}

pub fn promote_to_long_term(stm: &ShortTermMemory, now: DateTime<Utc>) -> LongTermMemory {
    let mut ltm = LongTermMemory::new(stm.content.clone(), stm.memory_type.as_str(), stm.importance);
    ltm.source_stm_ids = vec![stm.id.clone()];
    ltm.related_entity_ids = stm.related_entity_ids.clone();
    ltm.related_concepts = stm.context_tags.clone();
    ltm.retrieval_cues = tokenize(&stm.content)
        .into_iter()
        .take(RETRIEVAL_CUES)
        .collect();
    ltm.strength_score =
        (stm.importance + 0.05 * stm.access_count.min(10) as f64).min(1.0);
    ltm.created_at = now;
    ltm.last_accessed = now;
    ltm.embedding = stm.embedding.clone();
    ltm
}
