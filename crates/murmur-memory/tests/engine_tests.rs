//! Integration tests for the memory engine's tiering, retrieval, and
//! persistence behavior.

use std::sync::Arc;

use murmur_memory::{
    EntryDraft, EntryFilter, PlaceholderEmbedder, InMemoryStore, MemoryConfig, MemoryEngine, MemoryEvent,
    MemoryStore, RetrievalQuery,
};

fn small_config() -> MemoryConfig {
    MemoryConfig {
        short_term_capacity: 5,
        long_term_capacity: 10,
        embedding_dimension: 64,
        similarity_threshold: 0.7,
        ..Default::default()
    }
}

#[tokio::test]
async fn store_then_get_round_trips() {
    let engine = MemoryEngine::new(small_config());
    let stored = engine
        .store(
            EntryDraft::new("remember the milk")
                .with_source("user")
                .with_tags(vec!["errand".to_string()]),
        )
        .await
        .unwrap();

    let first = engine.get(&stored.id).await.unwrap().unwrap();
    assert_eq!(first.content, stored.content);
    assert_eq!(first.metadata, stored.metadata);
    assert_eq!(first.access_count, 1);

    let second = engine.get(&stored.id).await.unwrap().unwrap();
    assert_eq!(second.access_count, 2);

    assert!(engine.get("no-such-id").await.unwrap().is_none());
}

#[tokio::test]
async fn forget_removes_from_owning_tier() {
    let engine = MemoryEngine::new(small_config());
    let stored = engine.store(EntryDraft::new("ephemeral")).await.unwrap();

    assert!(engine.forget(&stored.id).await.unwrap());
    assert!(!engine.forget(&stored.id).await.unwrap());
    assert!(engine.get(&stored.id).await.unwrap().is_none());
}

#[tokio::test]
async fn clear_empties_both_tiers() {
    let engine = MemoryEngine::new(small_config());
    for i in 0..7 {
        // 7 stores through a capacity of 5 forces at least one
        // consolidation, so both tiers hold entries.
        engine
            .store(EntryDraft::new(format!("entry {}", i)))
            .await
            .unwrap();
    }
    assert!(engine.long_term_size().await.unwrap() > 0);

    engine.clear().await.unwrap();
    assert_eq!(engine.short_term_size().await.unwrap(), 0);
    assert_eq!(engine.long_term_size().await.unwrap(), 0);
}

#[tokio::test]
async fn consolidation_moves_lowest_scored_entries() {
    let engine = MemoryEngine::new(small_config());
    let mut events = engine.events().subscribe();

    // Importance is the only score differentiator here: all entries are
    // fresh with zero accesses.
    let importances = [0.9, 0.8, 0.7, 0.6, 0.2, 0.1];
    let mut ids = Vec::new();
    for (i, importance) in importances.iter().enumerate() {
        let stored = engine
            .store(
                EntryDraft::new(format!("memory {}", i))
                    .with_id(format!("m{}", i))
                    .with_importance(*importance),
            )
            .await
            .unwrap();
        ids.push(stored.id);
    }

    // The sixth store exceeded capacity 5: floor(5 * 0.8) = 4 stay, 2 move.
    assert_eq!(engine.short_term_size().await.unwrap(), 4);
    assert_eq!(engine.long_term_size().await.unwrap(), 2);

    let mut saw_consolidated = false;
    while let Ok(event) = events.try_recv() {
        if let MemoryEvent::Consolidated { moved } = event {
            assert_eq!(moved, 2);
            saw_consolidated = true;
        }
    }
    assert!(saw_consolidated);

    // Every entry is still reachable, and tier sizes are unchanged by
    // lookups: each id lives in exactly one tier.
    for (id, importance) in ids.iter().zip(importances.iter()) {
        let entry = engine.get(id).await.unwrap().unwrap();
        assert_eq!(entry.importance, *importance);
    }
    assert_eq!(engine.short_term_size().await.unwrap(), 4);
    assert_eq!(engine.long_term_size().await.unwrap(), 2);
}

#[tokio::test]
async fn restoring_consolidated_id_reclaims_it_from_long_term() {
    let config = MemoryConfig {
        short_term_capacity: 2,
        ..small_config()
    };
    let short_term = Arc::new(InMemoryStore::new());
    let long_term = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(PlaceholderEmbedder::new(config.embedding_dimension));
    let engine = MemoryEngine::with_parts(
        config,
        short_term.clone(),
        long_term.clone(),
        embedder,
    );

    engine
        .store(EntryDraft::new("weak").with_id("dup").with_importance(0.0))
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("strong one").with_importance(0.9))
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("strong two").with_importance(0.9))
        .await
        .unwrap();
    // The third store overflowed capacity 2, consolidating "dup" away.
    assert!(long_term.get("dup").await.unwrap().is_some());

    // Storing the id again must move it back, not duplicate it.
    engine
        .store(EntryDraft::new("weak, revised").with_id("dup"))
        .await
        .unwrap();
    assert!(short_term.get("dup").await.unwrap().is_some());
    assert!(long_term.get("dup").await.unwrap().is_none());
    let total =
        engine.short_term_size().await.unwrap() + engine.long_term_size().await.unwrap();
    assert_eq!(total, 3);

    // And forgetting it leaves no stale copy behind.
    assert!(engine.forget("dup").await.unwrap());
    assert!(engine.get("dup").await.unwrap().is_none());
}

#[tokio::test]
async fn pruning_deletes_lowest_scored_entries() {
    let config = small_config();
    let long_term = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(PlaceholderEmbedder::new(config.embedding_dimension));
    let engine = MemoryEngine::with_parts(
        config.clone(),
        Arc::new(InMemoryStore::new()),
        long_term.clone(),
        embedder,
    );

    let now = chrono::Utc::now();
    for i in 0..11 {
        let importance = i as f32 / 11.0;
        let entry = EntryDraft::new(format!("old memory {}", i))
            .with_id(format!("l{}", i))
            .with_importance(importance)
            .into_entry(vec![0.0; 64], now);
        long_term.set(entry).await.unwrap();
    }

    let deleted = engine.prune().await.unwrap();
    // floor(10 * 0.9) = 9 kept.
    assert_eq!(deleted, 2);
    assert_eq!(engine.long_term_size().await.unwrap(), 9);

    // The two lowest-importance entries are gone.
    assert!(long_term.get("l0").await.unwrap().is_none());
    assert!(long_term.get("l1").await.unwrap().is_none());
    assert!(long_term.get("l2").await.unwrap().is_some());
}

#[tokio::test]
async fn retrieve_finds_similar_text() {
    let engine = MemoryEngine::new(small_config());
    let stored = engine
        .store(EntryDraft::new("the quick brown fox"))
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("completely unrelated content"))
        .await
        .unwrap();

    let results = engine
        .retrieve(RetrievalQuery::new("the quick brown fox").with_min_similarity(0.999))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.id, stored.id);
    assert!((results[0].similarity - 1.0).abs() < 1e-5);
    // Embeddings are stripped unless requested.
    assert!(results[0].entry.embedding.is_empty());
    // Retrieval counts as an access.
    assert_eq!(results[0].entry.access_count, 1);
}

#[tokio::test]
async fn retrieve_can_include_embeddings() {
    let engine = MemoryEngine::new(small_config());
    engine.store(EntryDraft::new("keep my vector")).await.unwrap();

    let results = engine
        .retrieve(
            RetrievalQuery::new("keep my vector")
                .with_min_similarity(-1.0)
                .include_embeddings(),
        )
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].entry.embedding.len(), 64);
}

#[tokio::test]
async fn retrieve_respects_top_k_and_ordering() {
    let engine = MemoryEngine::new(small_config());
    engine.store(EntryDraft::new("alpha beta gamma")).await.unwrap();
    engine.store(EntryDraft::new("alpha beta delta")).await.unwrap();
    engine.store(EntryDraft::new("zzz yyy xxx")).await.unwrap();

    let results = engine
        .retrieve(
            RetrievalQuery::new("alpha beta gamma")
                .with_min_similarity(-1.0)
                .with_top_k(2),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].similarity >= results[1].similarity);
    assert_eq!(results[0].entry.content, "alpha beta gamma");
}

#[tokio::test]
async fn tag_filter_never_leaks_untagged_entries() {
    let engine = MemoryEngine::new(small_config());
    engine
        .store(EntryDraft::new("fix the outage").with_tags(vec!["urgent".to_string()]))
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("fix the outage later"))
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("water the plants").with_tags(vec!["chore".to_string()]))
        .await
        .unwrap();

    let results = engine
        .retrieve(
            RetrievalQuery::new("fix the outage")
                .with_min_similarity(-1.0)
                .with_filter(EntryFilter {
                    tags: vec!["urgent".to_string()],
                    ..Default::default()
                }),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(
        results[0]
            .entry
            .metadata
            .tags
            .contains(&"urgent".to_string())
    );
}

#[tokio::test]
async fn source_and_kind_filters_apply() {
    use murmur_memory::EntryKind;

    let engine = MemoryEngine::new(small_config());
    engine
        .store(
            EntryDraft::new("prefer dark mode")
                .with_source("user")
                .with_kind(EntryKind::Preference),
        )
        .await
        .unwrap();
    engine
        .store(EntryDraft::new("prefer dark mode too"))
        .await
        .unwrap();

    let results = engine
        .retrieve(
            RetrievalQuery::new("prefer dark mode")
                .with_min_similarity(-1.0)
                .with_filter(EntryFilter {
                    source: Some("user".to_string()),
                    kind: Some(EntryKind::Preference),
                    ..Default::default()
                }),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry.metadata.source, "user");
}

#[tokio::test]
async fn snapshot_persists_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let config = MemoryConfig {
        persistence_enabled: true,
        persistence_path: Some(dir.path().join("memory.json")),
        ..small_config()
    };

    let engine = MemoryEngine::new(config.clone());
    engine.initialize().await.unwrap();
    let stored = engine
        .store(EntryDraft::new("survive restarts").with_id("keeper"))
        .await
        .unwrap();
    engine.shutdown().await.unwrap();

    let reopened = MemoryEngine::new(config);
    let mut events = reopened.events().subscribe();
    reopened.initialize().await.unwrap();

    let loaded = reopened.get(&stored.id).await.unwrap().unwrap();
    assert_eq!(loaded.content, "survive restarts");

    let mut saw_loaded = false;
    while let Ok(event) = events.try_recv() {
        if let MemoryEvent::Loaded { entries } = event {
            assert_eq!(entries, 1);
            saw_loaded = true;
        }
    }
    assert!(saw_loaded);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let engine = MemoryEngine::new(small_config());
    let result = engine
        .store(EntryDraft::new("bad vector").with_embedding(vec![1.0, 2.0]))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn store_emits_stored_event() {
    let engine = MemoryEngine::new(small_config());
    let mut events = engine.events().subscribe();
    let stored = engine.store(EntryDraft::new("observable")).await.unwrap();

    match events.recv().await.unwrap() {
        MemoryEvent::Stored { id } => assert_eq!(id, stored.id),
        other => panic!("unexpected event: {:?}", other),
    }
}
