mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};
use engram::config::RetrievalConfig;
use engram::embedding::EmbeddingProvider;
use engram::error::AgentError;
use engram::memory::store::get_as;
use engram::memory::types::Embedding;
use engram::memory::{
    Entity, MemoryRecord, MemoryStore, MemoryType, Note, Relationship, SearchMode,
    ShortTermMemory,
};
use engram::retrieval::RetrievalEngine;

use helpers::{insert_stm, test_embedding, test_store, BrokenStore, MockEmbedder};

#[tokio::test]
async fn empty_store_yields_empty_context() {
    let store = test_store();
    let engine = RetrievalEngine::new(store, None);

    let ctx = engine.retrieve("hello", &RetrievalConfig::default()).await.unwrap();
    assert!(ctx.is_empty());
    assert_eq!(ctx.user_query, "hello");
    assert_eq!(ctx.search_mode, SearchMode::Keyword);
}

#[tokio::test]
async fn query_without_usable_terms_yields_empty_context() {
    let store = test_store();
    insert_stm(&store, "hi there, a note", 0.5, 0).await;
    let engine = RetrievalEngine::new(store, None);

    let ctx = engine.retrieve("hi a", &RetrievalConfig::default()).await.unwrap();
    assert!(ctx.is_empty());
}

#[tokio::test]
async fn short_term_results_capped_at_half_of_max_results() {
    let store = test_store();
    for i in 0..12 {
        insert_stm(&store, &format!("climbing session number {i}"), 0.5, i).await;
    }
    insert_stm(&store, "grocery list: milk and eggs", 0.5, 0).await;
    let engine = RetrievalEngine::new(store, None);

    let ctx = engine.retrieve("climbing", &RetrievalConfig::default()).await.unwrap();
    assert_eq!(ctx.short_term.len(), 5);
    assert!(ctx.short_term.iter().all(|m| m.content.contains("climbing")));

    // Best first: every item is an exact match, so the freshest wins.
    let scores: Vec<f64> = ctx
        .short_term
        .iter()
        .map(|m| ctx.score_of(&m.id).unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(ctx.short_term[0].content, "climbing session number 0");
}

#[tokio::test]
async fn results_below_relevance_threshold_are_dropped() {
    let store = test_store();
    let fresh = insert_stm(&store, "climb the north face", 0.5, 0).await;
    let old_partial = insert_stm(&store, "climbing shoes", 0.5, 24 * 60).await;
    let engine = RetrievalEngine::new(store, None);

    let lenient = engine.retrieve("climb", &RetrievalConfig::default()).await.unwrap();
    assert_eq!(lenient.short_term.len(), 2);

    let strict = RetrievalConfig {
        relevance_threshold: 0.5,
        ..RetrievalConfig::default()
    };
    let ctx = engine.retrieve("climb", &strict).await.unwrap();
    let ids: Vec<&str> = ctx.short_term.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![fresh.as_str()]);
    assert!(ctx.score_of(&old_partial).is_none());
}

#[tokio::test]
async fn hybrid_search_ranks_embedded_items_and_keeps_unembedded_ones() {
    let store = test_store();

    let mut embedded = ShortTermMemory::new("bouldering gym downtown", MemoryType::Semantic, 0.5);
    embedded.embedding = Some(Embedding::new(test_embedding("bouldering gym downtown")));
    let embedded_id = embedded.id.clone();
    store.insert(embedded.into()).await.unwrap();

    let plain = ShortTermMemory::new("bouldering gym membership", MemoryType::Semantic, 0.5);
    let plain_id = plain.id.clone();
    store.insert(plain.into()).await.unwrap();

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbedder::new());
    let engine = RetrievalEngine::new(store, Some(embedder));
    assert!(engine.has_embedder());

    let ctx = engine
        .retrieve("bouldering gym", &RetrievalConfig::default())
        .await
        .unwrap();
    assert_eq!(ctx.search_mode, SearchMode::Hybrid);
    assert_eq!(ctx.short_term.len(), 2);
    assert_eq!(ctx.short_term[0].id, embedded_id);

    // Keyword share only: 0.4 * 1.0.
    let plain_score = ctx.score_of(&plain_id).unwrap();
    assert!((plain_score - 0.4).abs() < 1e-9);
    assert!(ctx.score_of(&embedded_id).unwrap() > plain_score);
}

#[tokio::test]
async fn stale_embeddings_score_as_missing() {
    let store = test_store();
    let mut stm = ShortTermMemory::new("bouldering gym downtown", MemoryType::Semantic, 0.5);
    stm.embedding = Some(Embedding {
        vector: test_embedding("bouldering gym downtown"),
        generated_at: Utc::now() - Duration::days(120),
    });
    let id = stm.id.clone();
    store.insert(stm.into()).await.unwrap();

    let engine = RetrievalEngine::new(store, Some(Arc::new(MockEmbedder::new())));
    let ctx = engine
        .retrieve("bouldering gym downtown", &RetrievalConfig::default())
        .await
        .unwrap();
    assert!((ctx.score_of(&id).unwrap() - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn failed_query_embedding_falls_back_to_keyword_ranking() {
    let store = test_store();
    let id = insert_stm(&store, "dentist appointment on friday", 0.5, 1).await;
    let embedder = Arc::new(MockEmbedder::failing());
    let engine = RetrievalEngine::new(store, Some(embedder.clone()));

    let ctx = engine
        .retrieve("dentist appointment", &RetrievalConfig::default())
        .await
        .unwrap();
    assert_eq!(ctx.search_mode, SearchMode::KeywordFallback);
    assert!(ctx.search_mode.is_degraded());
    assert_eq!(ctx.short_term.len(), 1);
    assert_eq!(ctx.short_term[0].id, id);
    assert_eq!(embedder.calls(), 1);
}

#[tokio::test]
async fn semantic_search_can_be_disabled() {
    let store = test_store();
    insert_stm(&store, "dentist appointment on friday", 0.5, 1).await;
    let embedder = Arc::new(MockEmbedder::new());
    let engine = RetrievalEngine::new(store, Some(embedder.clone()));

    let config = RetrievalConfig {
        enable_semantic_search: false,
        ..RetrievalConfig::default()
    };
    let ctx = engine.retrieve("dentist", &config).await.unwrap();
    assert_eq!(ctx.search_mode, SearchMode::Keyword);
    assert_eq!(ctx.short_term.len(), 1);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn relationships_between_retrieved_entities_are_attached() {
    let store = test_store();
    let ana = Entity::new("Ana", "person");
    let lisbon = Entity::new("Lisbon", "place");
    let unrelated = Entity::new("Berlin", "place");
    let lives_in = Relationship::new(&ana.id, "lives_in", &lisbon.id);
    let visited = Relationship::new(&unrelated.id, "visited_by", "someone-else");
    let lives_in_id = lives_in.id.clone();
    let records: [MemoryRecord; 5] = [
        ana.into(),
        lisbon.into(),
        unrelated.into(),
        lives_in.into(),
        visited.into(),
    ];
    for record in records {
        store.insert(record).await.unwrap();
    }

    let engine = RetrievalEngine::new(store, None);
    let ctx = engine
        .retrieve("Is Ana still in Lisbon?", &RetrievalConfig::default())
        .await
        .unwrap();
    assert_eq!(ctx.entities.len(), 2);
    assert_eq!(ctx.relationships.len(), 1);
    assert_eq!(ctx.relationships[0].id, lives_in_id);
}

#[tokio::test]
async fn excluded_kinds_are_not_searched() {
    let store = test_store();
    store
        .insert(Note::new("Packing list", "passport, charger, climbing shoes").into())
        .await
        .unwrap();
    insert_stm(&store, "bought new climbing shoes", 0.5, 0).await;
    let engine = RetrievalEngine::new(store, None);

    let all = engine.retrieve("climbing shoes", &RetrievalConfig::default()).await.unwrap();
    assert_eq!(all.notes.len(), 1);
    assert_eq!(all.short_term.len(), 1);

    let config = RetrievalConfig {
        include_notes: false,
        ..RetrievalConfig::default()
    };
    let ctx = engine.retrieve("climbing shoes", &config).await.unwrap();
    assert!(ctx.notes.is_empty());
    assert_eq!(ctx.short_term.len(), 1);
}

#[tokio::test]
async fn long_queries_use_broad_fetch() {
    let store = test_store();
    insert_stm(&store, "plan the climbing trip to the coast", 0.5, 0).await;
    insert_stm(&store, "water the plants", 0.5, 0).await;
    let engine = RetrievalEngine::new(store, None);

    let ctx = engine
        .retrieve("rock climbing trip weekend plans", &RetrievalConfig::default())
        .await
        .unwrap();
    assert_eq!(ctx.short_term.len(), 1);
    assert!(ctx.short_term[0].content.contains("climbing trip"));
}

#[tokio::test]
async fn retrieved_short_term_memories_record_access() {
    let store = test_store();
    let id = insert_stm(&store, "call the plumber about the leak", 0.5, 0).await;
    let engine = RetrievalEngine::new(store.clone(), None);

    engine.retrieve("plumber", &RetrievalConfig::default()).await.unwrap();
    engine.retrieve("leak", &RetrievalConfig::default()).await.unwrap();

    let stm = get_as::<ShortTermMemory>(store.as_ref(), &id).await.unwrap().unwrap();
    assert_eq!(stm.access_count, 2);
}

#[tokio::test]
async fn personal_queries_are_flagged() {
    let engine = RetrievalEngine::new(test_store(), None);
    let ctx = engine
        .retrieve("what did my sister say", &RetrievalConfig::default())
        .await
        .unwrap();
    assert!(ctx.contains_personal_data);

    let ctx = engine
        .retrieve("capital of portugal", &RetrievalConfig::default())
        .await
        .unwrap();
    assert!(!ctx.contains_personal_data);
}

#[tokio::test]
async fn store_failure_is_a_retrieval_error() {
    let engine = RetrievalEngine::new(Arc::new(BrokenStore), None);
    let err = engine
        .retrieve("anything useful", &RetrievalConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::RetrievalFailed { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn entities_match_by_alias_and_accented_name_for_any_query_length() {
    let store = test_store();
    let mut entity = Entity::new("Émile Durand", "person");
    entity.aliases = vec!["Mimi".into()];
    store.insert(entity.clone().into()).await.unwrap();
    let engine = RetrievalEngine::new(store, None);
    let config = RetrievalConfig {
        relevance_threshold: 0.0,
        ..RetrievalConfig::default()
    };

    // Up to two terms go to the store's predicate; longer queries are
    // filtered in memory. Both paths must agree.
    for query in ["mimi", "émile", "mimi émile durand", "émile mimi durand"] {
        let ctx = engine.retrieve(query, &config).await.unwrap();
        assert_eq!(ctx.entities.len(), 1, "{query}");
        assert_eq!(ctx.entities[0].id, entity.id);
    }
}
