//! Test utilities for StateLock - clocks, stores and engine builders
//!
//! Everything here runs without a model download or a data directory:
//! engines built by [`in_memory_engine`] use [`InMemoryStore`] and
//! [`HashEmbeddingProvider`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::embedding::HashEmbeddingProvider;
use crate::error::{Result, StateLockError};
use crate::memory::{Clock, EngineConfig, MemoryEngine};
use crate::storage::{InMemoryStore, Neighbor, RecordFilter, RecordStore, StoredRecord};

/// Dimension of the hash embedder used by test engines
pub const TEST_DIMENSION: usize = 64;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 2025-01-01T00:00:00Z
    pub fn at_epoch() -> Self {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single();
        Self::new(start.expect("valid start time"))
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Store wrapper that can be switched off or told to fail writes
pub struct FailingStore {
    inner: Arc<dyn RecordStore>,
    down: AtomicBool,
    puts_remaining: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            puts_remaining: AtomicUsize::new(usize::MAX),
        }
    }

    /// Every call fails with a storage error while down
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Allow `n` more successful puts, then fail every put
    pub fn fail_puts_after(&self, n: usize) {
        self.puts_remaining.store(n, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StateLockError::Storage("store is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        self.check()?;
        let allowed = self
            .puts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if !allowed {
            return Err(StateLockError::Storage("write rejected".to_string()));
        }
        self.inner.put(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.check()?;
        self.inner.delete(ids).await
    }

    async fn delete_where(&self, filter: &RecordFilter) -> Result<()> {
        self.check()?;
        self.inner.delete_where(filter).await
    }

    async fn count(&self, filter: &RecordFilter) -> Result<usize> {
        self.check()?;
        self.inner.count(filter).await
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredRecord>> {
        self.check()?;
        self.inner.list(filter, limit, offset).await
    }

    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        self.check()?;
        self.inner.list_all(filter).await
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<Neighbor>> {
        self.check()?;
        self.inner.nearest_neighbors(vector, k, filter).await
    }

    async fn clear(&self) -> Result<()> {
        self.check()?;
        self.inner.clear().await
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// An engine plus handles on its clock and store
pub struct TestEngine {
    pub engine: MemoryEngine,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
}

/// Engine over an empty in-memory store with a manual clock
pub fn in_memory_engine() -> TestEngine {
    in_memory_engine_with(EngineConfig::default())
}

pub fn in_memory_engine_with(config: EngineConfig) -> TestEngine {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::at_epoch());
    let engine = engine_over(store.clone(), clock.clone(), config);
    TestEngine {
        engine,
        clock,
        store,
    }
}

/// Engine over any store, with the hash embedder
pub fn engine_over(
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
) -> MemoryEngine {
    let embedder = HashEmbeddingProvider::new(TEST_DIMENSION).expect("non-zero test dimension");
    MemoryEngine::new(store, Arc::new(embedder), clock, config)
}
