//! The memory engine
//!
//! Owns record identity, upsert rules, similarity and hybrid queries,
//! listing and deletes. Aggregations live in `insights`, bulk session
//! export and import in `snapshot`; both extend [`MemoryEngine`].
//!
//! The engine keeps no mutable state of its own. Store and embedder are
//! injected handles, and concurrent writes to one id resolve however the
//! store resolves them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StateLockError};
use crate::memory::clock::Clock;
use crate::memory::identity;
use crate::memory::ranking::{self, RankingWeights};
use crate::memory::tags::StoredTags;
use crate::memory::types::{
    HybridMemoryQuery, MemoryQuery, MemoryRecord, MemoryUpsert, NewMemory, Page, RankedMemory,
};
use crate::storage::{RecordFilter, RecordStore, StoredRecord};

/// Tuning knobs for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub candidate_multiplier: usize,
    pub max_candidates: usize,
    pub snapshot_batch_size: usize,
    pub recent_window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for EngineConfig {
    fn from(config: &QueryConfig) -> Self {
        Self {
            candidate_multiplier: config.candidate_multiplier,
            max_candidates: config.max_candidates,
            snapshot_batch_size: config.snapshot_batch_size.max(1),
            recent_window_hours: config.recent_window_hours,
        }
    }
}

#[derive(Clone)]
pub struct MemoryEngine {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl MemoryEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        info!(
            store = store.name(),
            embedder = embedder.name(),
            dimension = embedder.dimension(),
            "Memory engine ready"
        );
        Self {
            store,
            embedder,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Encode off the async dispatch path
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.encode(&text))
            .await
            .map_err(|e| StateLockError::Internal(format!("Embedding task failed: {e}")))?
    }

    /// Create a record under a fresh random id
    pub async fn add(&self, memory: NewMemory) -> Result<MemoryRecord> {
        require_fields(&memory.content, &memory.session_id)?;

        let id = identity::random_id();
        let embedding = self.embed(&memory.content).await.map_err(|e| e.context("add"))?;
        let now = self.clock.now();

        let stored = StoredRecord {
            id: id.clone(),
            content: memory.content.clone(),
            embedding,
            name: StoredRecord::stored_name(memory.name.as_deref()),
            session_id: memory.session_id.clone(),
            external_id: None,
            tags: StoredTags::List(memory.tags.clone()),
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.store
            .put(stored)
            .await
            .map_err(|e| e.context(format!("add {id}")))?;

        debug!(id = %id, session = %memory.session_id, "Added memory");

        Ok(MemoryRecord {
            id,
            content: memory.content,
            name: memory.name,
            session_id: memory.session_id,
            tags: memory.tags,
            external_id: None,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// Create or replace the record at the resolved id, keeping the
    /// original creation time when one exists
    pub async fn upsert(&self, upsert: MemoryUpsert) -> Result<MemoryRecord> {
        require_fields(&upsert.content, &upsert.session_id)?;

        let id = identity::resolve_id(&upsert);
        let embedding = self
            .embed(&upsert.content)
            .await
            .map_err(|e| e.context(format!("upsert {id}")))?;
        let now = self.clock.now();

        let existing = self
            .store
            .get(&id)
            .await
            .map_err(|e| e.context(format!("upsert {id}")))?;
        let created_at = existing.as_ref().and_then(|r| r.created_at).unwrap_or(now);

        let stored = StoredRecord {
            id: id.clone(),
            content: upsert.content.clone(),
            embedding,
            name: StoredRecord::stored_name(upsert.name.as_deref()),
            session_id: upsert.session_id.clone(),
            external_id: upsert.external_id.clone(),
            tags: StoredTags::List(upsert.tags.clone()),
            created_at: Some(created_at),
            updated_at: Some(now),
        };

        self.store
            .put(stored)
            .await
            .map_err(|e| e.context(format!("upsert {id}")))?;

        debug!(
            id = %id,
            session = %upsert.session_id,
            replaced = existing.is_some(),
            "Upserted memory"
        );

        Ok(MemoryRecord {
            id,
            content: upsert.content,
            name: upsert.name,
            session_id: upsert.session_id,
            tags: upsert.tags,
            external_id: upsert.external_id,
            created_at: Some(created_at),
            updated_at: Some(now),
        })
    }

    /// Fetch one record; `NotFound` when absent
    pub async fn get(&self, id: &str) -> Result<MemoryRecord> {
        self.store
            .get(id)
            .await
            .map_err(|e| e.context(format!("get {id}")))?
            .map(|r| r.to_memory())
            .ok_or_else(|| StateLockError::NotFound(format!("Memory {id} not found")))
    }

    /// Plain similarity search, nearest first
    pub async fn query(&self, query: &MemoryQuery) -> Result<Vec<RankedMemory>> {
        let vector = self
            .embed(&query.query_text)
            .await
            .map_err(|e| e.context("query"))?;
        let filter = RecordFilter::for_optional_session(query.session_id.as_deref());

        let neighbors = self
            .store
            .nearest_neighbors(&vector, query.top_k, &filter)
            .await
            .map_err(|e| e.context("query"))?;

        debug!(
            session = ?query.session_id,
            top_k = query.top_k,
            hits = neighbors.len(),
            "Similarity query"
        );

        Ok(neighbors
            .into_iter()
            .map(|n| RankedMemory {
                record: n.record.to_memory(),
                distance: n.distance.map(f64::from),
                score: None,
            })
            .collect())
    }

    /// Similarity search over an enlarged candidate pool, re-ranked by a
    /// blend of similarity and recency
    pub async fn hybrid_query(&self, query: &HybridMemoryQuery) -> Result<Vec<RankedMemory>> {
        let weights = RankingWeights::new(query.similarity_weight, query.recency_weight);
        weights.validate()?;

        let candidate_k = ranking::candidate_count(
            query.top_k,
            query.candidate_k,
            self.config.candidate_multiplier,
            self.config.max_candidates,
        );

        let candidates = self
            .query(&MemoryQuery {
                query_text: query.query_text.clone(),
                session_id: query.session_id.clone(),
                top_k: candidate_k,
            })
            .await
            .map_err(|e| e.context("hybrid query"))?;

        let fetched = candidates.len();
        let ranked = ranking::rank(candidates, weights, query.top_k, self.clock.now());

        debug!(
            candidate_k,
            fetched,
            returned = ranked.len(),
            "Hybrid query"
        );

        Ok(ranked)
    }

    /// One page of records in store order
    pub async fn list(
        &self,
        session_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let filter = RecordFilter::for_optional_session(session_id);
        let records = self
            .store
            .list(&filter, limit, offset)
            .await
            .map_err(|e| e.context("list"))?;
        Ok(records.iter().map(StoredRecord::to_memory).collect())
    }

    pub async fn count(&self, session_id: Option<&str>) -> Result<usize> {
        let filter = RecordFilter::for_optional_session(session_id);
        self.store
            .count(&filter)
            .await
            .map_err(|e| e.context("count"))
    }

    /// `list` plus `count`, as one envelope
    pub async fn page(
        &self,
        session_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<MemoryRecord>> {
        let items = self.list(session_id, limit, offset).await?;
        let total = self.count(session_id).await?;
        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Delete one record; absent ids are a no-op
    pub async fn delete_one(&self, id: &str) -> Result<()> {
        self.store
            .delete(&[id.to_string()])
            .await
            .map_err(|e| e.context(format!("delete {id}")))?;
        debug!(id, "Deleted memory");
        Ok(())
    }

    pub async fn delete_many(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .delete(ids)
            .await
            .map_err(|e| e.context(format!("delete {} memories", ids.len())))?;
        debug!(count = ids.len(), "Deleted memories");
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Err(StateLockError::Validation(
                "session_id must not be empty".to_string(),
            ));
        }
        self.store
            .delete_where(&RecordFilter::for_session(session_id))
            .await
            .map_err(|e| e.context(format!("delete session {session_id}")))?;
        info!(session = session_id, "Deleted session");
        Ok(())
    }

    /// Remove every record
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await.map_err(|e| e.context("reset"))?;
        info!("Store cleared");
        Ok(())
    }
}

fn require_fields(content: &str, session_id: &str) -> Result<()> {
    if content.is_empty() {
        return Err(StateLockError::Validation(
            "content must not be empty".to_string(),
        ));
    }
    if session_id.is_empty() {
        return Err(StateLockError::Validation(
            "session_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
