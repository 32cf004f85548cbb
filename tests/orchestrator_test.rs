mod helpers;

use std::sync::Arc;
use std::time::Duration;

use engram::agent::ActionKind;
use engram::config::EngramConfig;
use engram::db::{open_memory_database, SqliteMemoryStore};
use engram::error::AgentError;
use engram::memory::store::fetch_as;
use engram::memory::{FetchRequest, Note, RecordKind};
use engram::orchestrator::insights::InsightKind;
use engram::orchestrator::perception::Intent;
use engram::orchestrator::{Orchestrator, OrchestratorEvent, OrchestratorState};

use helpers::{count, insert_stm, test_agent, test_store, MockResponder};

async fn idle_orchestrator(
    store: Arc<SqliteMemoryStore>,
    provider: Arc<MockResponder>,
    config: &EngramConfig,
) -> Arc<Orchestrator> {
    let agent = test_agent(store, None, Some(provider), config).await;
    Arc::new(Orchestrator::new(agent, config))
}

/// Started orchestrator, ready for queries.
async fn orchestrator(
    store: Arc<SqliteMemoryStore>,
    provider: Arc<MockResponder>,
    config: &EngramConfig,
) -> Arc<Orchestrator> {
    let orch = idle_orchestrator(store, provider, config).await;
    orch.start().await.unwrap();
    orch
}

/// In-memory store whose episode inserts always fail.
fn store_refusing_episodes() -> Arc<SqliteMemoryStore> {
    let conn = open_memory_database().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER refuse_episode BEFORE INSERT ON episodic_memories \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();
    Arc::new(SqliteMemoryStore::new(conn))
}

async fn fill_backlog(store: &SqliteMemoryStore, n: usize) {
    for i in 0..n {
        insert_stm(store, &format!("backlog item {i}"), 0.3, 30).await;
    }
}

#[tokio::test]
async fn backlog_triggers_consolidation_above_threshold() {
    let store = test_store();
    fill_backlog(&store, 51).await;
    let mut config = EngramConfig::default();
    config.agent.action_confidence_threshold = 0.8;
    let orch = orchestrator(store.clone(), Arc::new(MockResponder::new()), &config).await;

    let response = orch.process_query("status update").await.unwrap();

    let consolidation: Vec<_> = response
        .autonomous_actions
        .iter()
        .filter(|a| a.kind == ActionKind::Consolidation)
        .collect();
    assert_eq!(consolidation.len(), 1);
    assert!(consolidation[0].success);
    assert!((consolidation[0].confidence - 0.9).abs() < 1e-9);
    assert!(consolidation[0].detail.contains("examined 51"));

    // Only the interaction stored at the end of the cycle remains.
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 1);
    assert_eq!(orch.state(), OrchestratorState::Active);
}

#[tokio::test]
async fn backlog_recommendation_skipped_below_threshold() {
    let store = test_store();
    fill_backlog(&store, 51).await;
    let mut config = EngramConfig::default();
    config.agent.action_confidence_threshold = 0.95;
    let orch = orchestrator(store.clone(), Arc::new(MockResponder::new()), &config).await;

    let response = orch.process_query("status update").await.unwrap();
    assert!(response.autonomous_actions.is_empty());
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 52);

    // The backlog still shows up as an insight.
    assert!(orch
        .insights()
        .iter()
        .any(|i| i.kind == InsightKind::ConsolidationBacklog));
}

#[tokio::test]
async fn task_queries_produce_a_notification_when_allowed() {
    let mut config = EngramConfig::default();
    config.agent.action_confidence_threshold = 0.6;
    let orch = orchestrator(test_store(), Arc::new(MockResponder::new()), &config).await;

    let response = orch
        .process_query("remind me to water the plants")
        .await
        .unwrap();
    assert_eq!(response.autonomous_actions.len(), 1);
    let action = &response.autonomous_actions[0];
    assert_eq!(action.kind, ActionKind::Notification);
    assert_eq!(action.detail, "Task noted: remind me to water the plants");

    let history = orch.history().await;
    assert_eq!(history[0].intent, Intent::Task);
    assert_eq!(history[0].actions.len(), 1);
}

#[tokio::test]
async fn notification_is_saved_and_announced() {
    let store = test_store();
    let mut config = EngramConfig::default();
    config.agent.action_confidence_threshold = 0.6;
    let orch = orchestrator(store.clone(), Arc::new(MockResponder::new()), &config).await;
    let mut events = orch.subscribe_events();

    orch.process_query("remind me to renew the passport").await.unwrap();

    let mut messages = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::Notification { message } = event {
            messages.push(message);
        }
    }
    assert_eq!(messages, vec!["Task noted: remind me to renew the passport"]);

    let notes = fetch_as::<Note>(store.as_ref(), FetchRequest::new(RecordKind::Note))
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "remind me to renew the passport");
    assert_eq!(notes[0].tags, vec!["task"]);
}

#[tokio::test]
async fn storage_failure_persists_nothing() {
    let store = store_refusing_episodes();
    let orch = orchestrator(store.clone(), Arc::new(MockResponder::new()), &EngramConfig::default()).await;

    let err = orch.process_query("where did I park the car").await.unwrap_err();
    assert!(matches!(err, AgentError::Storage { .. }));
    assert_eq!(orch.state(), OrchestratorState::Error);

    assert_eq!(count(&store, RecordKind::Interaction).await, 0);
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 0);
    assert!(orch.history().await.is_empty());
}

#[tokio::test]
async fn queries_rejected_unless_started() {
    let store = test_store();
    let provider = Arc::new(MockResponder::new());
    let orch = idle_orchestrator(store.clone(), provider.clone(), &EngramConfig::default()).await;

    let err = orch.process_query("what is on my calendar").await.unwrap_err();
    assert!(matches!(err, AgentError::NotInitialized));
    assert_eq!(orch.state(), OrchestratorState::Idle);

    orch.start().await.unwrap();
    orch.process_query("what is on my calendar").await.unwrap();
    assert_eq!(orch.state(), OrchestratorState::Active);

    orch.stop().await;
    let err = orch.process_query("what is on my calendar").await.unwrap_err();
    assert!(matches!(err, AgentError::NotInitialized));
    assert_eq!(orch.state(), OrchestratorState::Idle);

    assert_eq!(provider.calls().await, 1);
    assert_eq!(count(&store, RecordKind::Interaction).await, 1);
}

#[tokio::test]
async fn generation_failure_persists_nothing_and_recovers() {
    let store = test_store();
    let orch = orchestrator(
        store.clone(),
        Arc::new(MockResponder::failing()),
        &EngramConfig::default(),
    )
    .await;
    let mut events = orch.subscribe_events();

    let err = orch.process_query("what is on my calendar").await.unwrap_err();
    assert!(matches!(err, AgentError::GenerationFailed { .. }));
    assert_eq!(orch.state(), OrchestratorState::Active);

    assert_eq!(count(&store, RecordKind::Interaction).await, 0);
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 0);
    assert_eq!(count(&store, RecordKind::Episodic).await, 0);
    assert!(orch.history().await.is_empty());

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::CycleFailed { query, .. } = event {
            assert_eq!(query, "what is on my calendar");
            failed = true;
        }
    }
    assert!(failed);
}

#[tokio::test]
async fn successful_cycle_persists_learning_record_and_interaction() {
    let store = test_store();
    let provider = Arc::new(MockResponder::with_replies(vec!["Level 3, row F"]));
    let orch = orchestrator(store.clone(), provider, &EngramConfig::default()).await;
    let mut events = orch.subscribe_events();

    let response = orch.process_query("where did I park the car").await.unwrap();
    assert_eq!(response.content, "Level 3, row F");
    assert!(response.processing_time_seconds >= 0.0);

    assert_eq!(count(&store, RecordKind::Interaction).await, 1);
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 1);
    assert_eq!(count(&store, RecordKind::Episodic).await, 1);

    let history = orch.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "where did I park the car");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen.first(),
        Some(&OrchestratorEvent::StateChanged {
            from: OrchestratorState::Active,
            to: OrchestratorState::Processing,
        })
    );
    assert!(seen.iter().any(|e| matches!(
        e,
        OrchestratorEvent::StateChanged {
            from: OrchestratorState::Processing,
            to: OrchestratorState::Active,
        }
    )));
    assert!(matches!(
        seen.last(),
        Some(OrchestratorEvent::CycleCompleted { actions: 0, .. })
    ));
}

#[tokio::test]
async fn history_is_bounded() {
    let mut config = EngramConfig::default();
    config.orchestrator.history_limit = 3;
    let orch = orchestrator(test_store(), Arc::new(MockResponder::new()), &config).await;

    for i in 0..5 {
        orch.process_query(&format!("question number {i}")).await.unwrap();
    }
    let queries: Vec<String> = orch.history().await.into_iter().map(|r| r.query).collect();
    assert_eq!(
        queries,
        vec!["question number 2", "question number 3", "question number 4"]
    );
}

#[tokio::test]
async fn periodic_review_reports_backlog() {
    let store = test_store();
    fill_backlog(&store, 51).await;
    let orch = orchestrator(store, Arc::new(MockResponder::new()), &EngramConfig::default()).await;
    let mut insights_rx = orch.subscribe_insights();

    let found = orch.generate_insights().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, InsightKind::ConsolidationBacklog);
    assert!(found[0].message.starts_with("51 short-term memories"));

    assert!(insights_rx.has_changed().unwrap());
    assert_eq!(insights_rx.borrow_and_update().len(), 1);

    // Same finding again replaces rather than duplicates.
    orch.generate_insights().await.unwrap();
    assert_eq!(orch.insights().len(), 1);
}

#[tokio::test]
async fn recall_without_memories_is_a_knowledge_gap() {
    let orch = orchestrator(test_store(), Arc::new(MockResponder::new()), &EngramConfig::default()).await;
    orch.process_query("when did I last see the dentist").await.unwrap();

    let insights = orch.insights();
    assert!(insights
        .iter()
        .any(|i| i.kind == InsightKind::KnowledgeGap && i.message.contains("dentist")));
}

#[tokio::test(start_paused = true)]
async fn scheduled_consolidation_runs_until_stopped() {
    let store = test_store();
    insert_stm(&store, "important and old", 0.9, 30).await;
    let mut config = EngramConfig::default();
    config.agent.consolidation_interval_seconds = 60;
    let orch = idle_orchestrator(store.clone(), Arc::new(MockResponder::new()), &config).await;

    orch.start().await.unwrap();
    orch.start().await.unwrap();
    assert_eq!(orch.state(), OrchestratorState::Active);
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 1);

    let mut swept = false;
    for _ in 0..300 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if count(&store, RecordKind::ShortTerm).await == 0 {
            swept = true;
            break;
        }
    }
    assert!(swept, "consolidation never ran");

    orch.stop().await;
    assert_eq!(orch.state(), OrchestratorState::Idle);

    insert_stm(&store, "important and old", 0.9, 30).await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(count(&store, RecordKind::ShortTerm).await, 1);
}
