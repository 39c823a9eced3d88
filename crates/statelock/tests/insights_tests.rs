//! Sessions, tags and overview stats through the engine

use chrono::Duration;

use statelock_server::StateLockError;
use statelock_server::memory::EngineConfig;
use statelock_server::memory::types::NewMemory;
use statelock_server::testing::{in_memory_engine, in_memory_engine_with};

#[tokio::test]
async fn test_sessions_newest_first_with_counts() {
    let t = in_memory_engine();
    t.engine
        .add(NewMemory::new("a1").with_session("agent:chat:a"))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("a2").with_session("agent:chat:a"))
        .await
        .unwrap();
    t.clock.advance(Duration::hours(1));
    t.engine
        .add(NewMemory::new("b1").with_session("agent:chat:b"))
        .await
        .unwrap();

    let page = t.engine.list_sessions(50, 0).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].session_id, "agent:chat:b");
    assert_eq!(page.items[0].memory_count, 1);
    assert_eq!(page.items[1].session_id, "agent:chat:a");
    assert_eq!(page.items[1].memory_count, 2);

    let second = t.engine.list_sessions(1, 1).await.unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].session_id, "agent:chat:a");
}

#[tokio::test]
async fn test_tags_by_frequency_then_name() {
    let t = in_memory_engine();
    t.engine
        .add(NewMemory::new("one").with_tags(["ops", "db"]))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("two").with_tags(["db", "billing"]))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("three").with_tags(["db", "ops"]))
        .await
        .unwrap();

    let page = t.engine.list_tags(20, 0).await.unwrap();
    let tags: Vec<(&str, usize)> = page
        .items
        .iter()
        .map(|s| (s.tag.as_str(), s.count))
        .collect();
    assert_eq!(tags, vec![("db", 3), ("ops", 2), ("billing", 1)]);
}

#[tokio::test]
async fn test_stats_overview_counts_recent_writes() {
    let t = in_memory_engine();
    t.engine
        .add(NewMemory::new("old").with_session("s1").with_tags(["x"]))
        .await
        .unwrap();
    t.clock.advance(Duration::hours(30));
    t.engine
        .add(NewMemory::new("fresh").with_session("s2").with_tags(["x", "y"]))
        .await
        .unwrap();
    t.engine
        .add(NewMemory::new("fresher").with_session("s2"))
        .await
        .unwrap();

    let stats = t.engine.stats_overview(1).await.unwrap();
    assert_eq!(stats.total_memories, 3);
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.recent_writes_24h, 2);
    assert_eq!(stats.top_tags.len(), 1);
    assert_eq!(stats.top_tags[0].tag, "x");
    assert_eq!(stats.top_tags[0].count, 2);
}

#[tokio::test]
async fn test_recent_window_is_configurable() {
    let t = in_memory_engine_with(EngineConfig {
        recent_window_hours: 48,
        ..EngineConfig::default()
    });
    t.engine.add(NewMemory::new("day old")).await.unwrap();
    t.clock.advance(Duration::hours(30));

    let stats = t.engine.stats_overview(5).await.unwrap();
    assert_eq!(stats.recent_writes_24h, 1);
}

#[tokio::test]
async fn test_out_of_range_window_is_an_error() {
    let t = in_memory_engine_with(EngineConfig {
        recent_window_hours: i64::MAX,
        ..EngineConfig::default()
    });
    t.engine.add(NewMemory::new("anything")).await.unwrap();

    let err = t.engine.stats_overview(5).await.unwrap_err();
    assert!(matches!(err, StateLockError::Config(_)));
}

#[tokio::test]
async fn test_empty_store_overview() {
    let t = in_memory_engine();
    let stats = t.engine.stats_overview(5).await.unwrap();
    assert_eq!(stats.total_memories, 0);
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.recent_writes_24h, 0);
    assert!(stats.top_tags.is_empty());
}
