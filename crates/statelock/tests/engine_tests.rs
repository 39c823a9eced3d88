//! Engine behavior over the in-memory store

use std::sync::Arc;

use chrono::Duration;

use statelock_server::error::{ErrorKind, StateLockError};
use statelock_server::memory::types::{
    HybridMemoryQuery, MemoryQuery, MemoryUpsert, NewMemory, UNNAMED_BLOCK,
};
use statelock_server::memory::EngineConfig;
use statelock_server::memory::identity::derive_id;
use statelock_server::storage::{InMemoryStore, RecordStore};
use statelock_server::testing::{FailingStore, ManualClock, engine_over, in_memory_engine};

#[tokio::test]
async fn test_added_memory_is_found_by_query() {
    let t = in_memory_engine();

    let created = t
        .engine
        .add(
            NewMemory::new("The sky is blue.")
                .with_session("s1")
                .with_tags(["nature", "color"]),
        )
        .await
        .unwrap();

    let results = t
        .engine
        .query(&MemoryQuery::new("What color is the sky?").in_session("s1").top_k(1))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.id, created.id);
    assert_eq!(results[0].record.tags, vec!["nature", "color"]);
    assert!(results[0].distance.is_some());
    assert!(results[0].score.is_none());
}

#[tokio::test]
async fn test_add_assigns_distinct_ids() {
    let t = in_memory_engine();
    let a = t.engine.add(NewMemory::new("same text")).await.unwrap();
    let b = t.engine.add(NewMemory::new("same text")).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(t.engine.count(None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_add_without_name_reads_back_placeholder() {
    let t = in_memory_engine();
    let created = t.engine.add(NewMemory::new("no name here")).await.unwrap();
    assert_eq!(created.name, None);
    assert_eq!(created.session_id, "default");

    let fetched = t.engine.get(&created.id).await.unwrap();
    assert_eq!(fetched.name.as_deref(), Some(UNNAMED_BLOCK));
}

#[tokio::test]
async fn test_upsert_is_idempotent_and_keeps_created_at() {
    let t = in_memory_engine();
    let upsert = MemoryUpsert::new("Use Postgres for billing.")
        .with_session("s1")
        .with_name("db-decision");

    let first = t.engine.upsert(upsert.clone()).await.unwrap();
    t.clock.advance(Duration::minutes(5));
    let second = t.engine.upsert(upsert).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.id.starts_with("mem_"));
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(t.engine.count(Some("s1")).await.unwrap(), 1);

    let stored = t.engine.get(&first.id).await.unwrap();
    assert_eq!(stored.created_at, first.created_at);
    assert_eq!(stored.updated_at, second.updated_at);
}

#[tokio::test]
async fn test_upsert_by_external_id_replaces_content() {
    let t = in_memory_engine();
    let first = t
        .engine
        .upsert(MemoryUpsert::new("v1").with_external_id("ext-1").with_tags(["a"]))
        .await
        .unwrap();
    let second = t
        .engine
        .upsert(MemoryUpsert::new("v2").with_external_id("ext-1"))
        .await
        .unwrap();

    assert_eq!(first.id, derive_id("ext-1"));
    assert_eq!(second.id, first.id);

    let stored = t.engine.get(&first.id).await.unwrap();
    assert_eq!(stored.content, "v2");
    assert!(stored.tags.is_empty());
    assert_eq!(stored.external_id.as_deref(), Some("ext-1"));
}

#[tokio::test]
async fn test_empty_external_id_does_not_merge_records() {
    let t = in_memory_engine();
    let a = t
        .engine
        .upsert(
            MemoryUpsert::new("alpha fact")
                .with_session("s1")
                .with_external_id(""),
        )
        .await
        .unwrap();
    let b = t
        .engine
        .upsert(
            MemoryUpsert::new("beta fact")
                .with_session("s2")
                .with_external_id(""),
        )
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(t.engine.count(None).await.unwrap(), 2);
    assert_eq!(t.engine.get(&a.id).await.unwrap().content, "alpha fact");
}

#[tokio::test]
async fn test_explicit_id_wins_over_external_id() {
    let t = in_memory_engine();
    let record = t
        .engine
        .upsert(
            MemoryUpsert::new("content")
                .with_id("explicit")
                .with_external_id("ext"),
        )
        .await
        .unwrap();
    assert_eq!(record.id, "explicit");
}

#[tokio::test]
async fn test_count_matches_full_listing() {
    let t = in_memory_engine();
    for i in 0..5 {
        t.engine
            .add(NewMemory::new(format!("note {i}")).with_session("s1"))
            .await
            .unwrap();
    }
    t.engine
        .add(NewMemory::new("elsewhere").with_session("s2"))
        .await
        .unwrap();

    let listed = t.engine.list(Some("s1"), 100, 0).await.unwrap();
    assert_eq!(t.engine.count(Some("s1")).await.unwrap(), listed.len());

    let everything = t.engine.list(None, 100, 0).await.unwrap();
    assert_eq!(t.engine.count(None).await.unwrap(), everything.len());

    // blank session filter means no filter
    assert_eq!(t.engine.count(Some("")).await.unwrap(), 6);
}

#[tokio::test]
async fn test_page_reports_total_and_window() {
    let t = in_memory_engine();
    for i in 0..7 {
        t.engine.add(NewMemory::new(format!("n{i}"))).await.unwrap();
    }

    let page = t.engine.page(None, 3, 5).await.unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.limit, 3);
    assert_eq!(page.offset, 5);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let t = in_memory_engine();
    let err = t.engine.get("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_missing_is_noop() {
    let t = in_memory_engine();
    let kept = t.engine.add(NewMemory::new("keep me")).await.unwrap();

    t.engine.delete_one("missing").await.unwrap();
    t.engine
        .delete_many(&["missing".to_string(), "also-missing".to_string()])
        .await
        .unwrap();
    t.engine.delete_many(&[]).await.unwrap();

    assert_eq!(t.engine.count(None).await.unwrap(), 1);
    assert!(t.engine.get(&kept.id).await.is_ok());
}

#[tokio::test]
async fn test_delete_session_only_touches_that_session() {
    let t = in_memory_engine();
    t.engine
        .add(NewMemory::new("a").with_session("s1"))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("b").with_session("s1"))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("c").with_session("s2"))
        .await
        .unwrap();

    t.engine.delete_session("s1").await.unwrap();

    assert_eq!(t.engine.count(Some("s1")).await.unwrap(), 0);
    assert_eq!(t.engine.count(Some("s2")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_session_rejects_empty_id() {
    let t = in_memory_engine();
    let err = t.engine.delete_session("").await.unwrap_err();
    assert!(matches!(err, StateLockError::Validation(_)));
}

#[tokio::test]
async fn test_reset_clears_store() {
    let t = in_memory_engine();
    t.engine.add(NewMemory::new("one")).await.unwrap();
    t.engine.add(NewMemory::new("two")).await.unwrap();

    t.engine.reset().await.unwrap();
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_empty_content_is_rejected() {
    let t = in_memory_engine();
    let err = t.engine.add(NewMemory::new("")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_zero_weight_sum_rejected_before_fetch() {
    let inner: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
    let failing = Arc::new(FailingStore::new(inner));
    let engine = engine_over(
        failing.clone(),
        Arc::new(ManualClock::at_epoch()),
        EngineConfig::default(),
    );

    // a down store would turn any fetch into an unavailable error
    failing.set_down(true);

    let err = engine
        .hybrid_query(&HybridMemoryQuery::new("anything").weights(0.0, 0.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_store_outage_is_unavailable() {
    let inner: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
    let failing = Arc::new(FailingStore::new(inner));
    let engine = engine_over(
        failing.clone(),
        Arc::new(ManualClock::at_epoch()),
        EngineConfig::default(),
    );

    engine.add(NewMemory::new("before outage")).await.unwrap();
    failing.set_down(true);

    let err = engine
        .query(&MemoryQuery::new("before"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.to_string().contains("query"));

    let err = engine.add(NewMemory::new("during outage")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}
