//! Record store adapters
//!
//! The engine talks to storage only through [`RecordStore`]. Two adapters
//! ship with the crate: [`LanceStore`] (LanceDB on disk) and
//! [`InMemoryStore`].

pub mod filter;
pub mod lance;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::memory::tags::StoredTags;
use crate::memory::types::{MemoryRecord, UNNAMED_BLOCK};

pub use filter::RecordFilter;
pub use lance::LanceStore;
pub use memory::InMemoryStore;

/// A record in its persisted form, embedding included
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub name: String,
    pub session_id: String,
    pub external_id: Option<String>,
    pub tags: StoredTags,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    /// Caller-facing projection; drops the embedding and decodes tags
    pub fn to_memory(&self) -> MemoryRecord {
        MemoryRecord {
            id: self.id.clone(),
            content: self.content.clone(),
            name: Some(self.name.clone()),
            session_id: self.session_id.clone(),
            tags: self.tags.decode(),
            external_id: self.external_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn stored_name(name: Option<&str>) -> String {
        match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => UNNAMED_BLOCK.to_string(),
        }
    }
}

/// A similarity hit with its raw distance (lower is closer)
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub record: StoredRecord,
    pub distance: Option<f32>,
}

/// Key-value plus vector collection used by the engine.
///
/// Writes are last-write-wins per id. Listing order is whatever the store
/// considers stable for a given snapshot of its contents.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record with `record.id`
    async fn put(&self, record: StoredRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>>;

    /// Delete records by id; ids that do not exist are ignored
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Delete every record matching the filter
    async fn delete_where(&self, filter: &RecordFilter) -> Result<()>;

    async fn count(&self, filter: &RecordFilter) -> Result<usize>;

    /// One page of matching records in store order
    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredRecord>>;

    /// Every matching record in store order
    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;

    /// Up to `k` matching records closest to `vector`, nearest first
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<Neighbor>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Short adapter name for logs
    fn name(&self) -> &'static str;
}
