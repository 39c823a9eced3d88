//! In-process record store
//!
//! Keeps records in insertion order behind a lock and answers similarity
//! queries by brute force using squared L2 distance, matching the metric
//! LanceDB reports by default.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::storage::{Neighbor, RecordFilter, RecordStore, StoredRecord};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn put(&self, record: StoredRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut records = self.records.write().await;
        records.retain(|r| !ids.contains(&r.id));
        Ok(())
    }

    async fn delete_where(&self, filter: &RecordFilter) -> Result<()> {
        let mut records = self.records.write().await;
        records.retain(|r| !filter.matches(r));
        Ok(())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| filter.matches(r)).count())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| filter.matches(r))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        filter: &RecordFilter,
    ) -> Result<Vec<Neighbor>> {
        let records = self.records.read().await;
        let mut scored: Vec<(f32, &StoredRecord)> = records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| (squared_l2(vector, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| Neighbor {
                record: record.clone(),
                distance: Some(distance),
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tags::StoredTags;

    fn record(id: &str, session: &str, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            content: format!("content of {id}"),
            embedding,
            name: "Unnamed Block".to_string(),
            session_id: session.to_string(),
            external_id: None,
            tags: StoredTags::default(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_put_replaces_in_place() {
        let store = InMemoryStore::new();
        store.put(record("a", "s1", vec![0.0])).await.unwrap();
        store.put(record("b", "s1", vec![0.0])).await.unwrap();

        let mut replacement = record("a", "s2", vec![1.0]);
        replacement.content = "updated".into();
        store.put(replacement).await.unwrap();

        let all = store.list_all(&RecordFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");
        assert_eq!(all[0].content, "updated");
        assert_eq!(all[1].id, "b");
    }

    #[tokio::test]
    async fn test_list_pages_in_insertion_order() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store
                .put(record(&format!("r{i}"), "s1", vec![0.0]))
                .await
                .unwrap();
        }

        let page = store.list(&RecordFilter::new(), 2, 1).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_nearest_neighbors_orders_by_distance() {
        let store = InMemoryStore::new();
        store.put(record("far", "s1", vec![3.0, 0.0])).await.unwrap();
        store.put(record("near", "s1", vec![1.0, 0.0])).await.unwrap();
        store.put(record("other", "s2", vec![0.0, 0.0])).await.unwrap();

        let hits = store
            .nearest_neighbors(&[0.0, 0.0], 5, &RecordFilter::for_session("s1"))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "near");
        assert_eq!(hits[0].distance, Some(1.0));
        assert_eq!(hits[1].record.id, "far");
        assert_eq!(hits[1].distance, Some(9.0));
    }

    #[tokio::test]
    async fn test_delete_ignores_missing_ids() {
        let store = InMemoryStore::new();
        store.put(record("a", "s1", vec![0.0])).await.unwrap();

        store
            .delete(&["missing".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_where_session() {
        let store = InMemoryStore::new();
        store.put(record("a", "s1", vec![0.0])).await.unwrap();
        store.put(record("b", "s2", vec![0.0])).await.unwrap();

        store
            .delete_where(&RecordFilter::for_session("s1"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.count(&RecordFilter::for_session("s2")).await.unwrap(), 1);
    }
}
