//! Aggregations over the whole store: sessions, tags and overview stats

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::recent_window;
use crate::error::Result;
use crate::memory::engine::MemoryEngine;
use crate::memory::types::{Page, SessionSummary, StatsOverview, TagSummary};
use crate::storage::{RecordFilter, StoredRecord};

impl MemoryEngine {
    async fn scan_all(&self, op: &str) -> Result<Vec<StoredRecord>> {
        self.store()
            .list_all(&RecordFilter::new())
            .await
            .map_err(|e| e.context(op))
    }

    /// Sessions ordered by last write (newest first), then session id
    pub async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Page<SessionSummary>> {
        let records = self.scan_all("list sessions").await?;
        Ok(Page::slice(summarize_sessions(&records), limit, offset))
    }

    /// Tags ordered by frequency (highest first), then tag text
    pub async fn list_tags(&self, limit: usize, offset: usize) -> Result<Page<TagSummary>> {
        let records = self.scan_all("list tags").await?;
        Ok(Page::slice(count_tags(&records), limit, offset))
    }

    pub async fn stats_overview(&self, top_tags_limit: usize) -> Result<StatsOverview> {
        let total_memories = self.count(None).await?;
        let records = self.scan_all("stats overview").await?;

        let now = self.clock().now();
        let window = recent_window(self.config().recent_window_hours)?;
        let recent_writes_24h = records
            .iter()
            .filter_map(last_written)
            .filter(|ts| now - *ts <= window)
            .count();

        let mut top_tags = count_tags(&records);
        top_tags.truncate(top_tags_limit);

        Ok(StatsOverview {
            total_memories,
            total_sessions: summarize_sessions(&records).len(),
            recent_writes_24h,
            top_tags,
        })
    }
}

fn last_written(record: &StoredRecord) -> Option<DateTime<Utc>> {
    record.updated_at.or(record.created_at)
}

pub(crate) fn summarize_sessions(records: &[StoredRecord]) -> Vec<SessionSummary> {
    let mut sessions: HashMap<&str, SessionSummary> = HashMap::new();

    for record in records {
        let session_id = record.session_id.trim();
        if session_id.is_empty() {
            continue;
        }
        let written = last_written(record);

        let summary = sessions
            .entry(session_id)
            .or_insert_with(|| SessionSummary {
                session_id: session_id.to_string(),
                memory_count: 0,
                last_updated: None,
            });
        summary.memory_count += 1;
        if written > summary.last_updated {
            summary.last_updated = written;
        }
    }

    let mut ordered: Vec<SessionSummary> = sessions.into_values().collect();
    ordered.sort_by(|a, b| {
        let a_time = a.last_updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let b_time = b.last_updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        b_time
            .cmp(&a_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    ordered
}

pub(crate) fn count_tags(records: &[StoredRecord]) -> Vec<TagSummary> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for tag in record.tags.decode() {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    let mut ordered: Vec<TagSummary> = counts
        .into_iter()
        .map(|(tag, count)| TagSummary { tag, count })
        .collect();
    ordered.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tags::StoredTags;
    use chrono::TimeZone;

    fn record(id: &str, session: &str, tags: StoredTags, hour: Option<u32>) -> StoredRecord {
        let ts = hour.map(|h| Utc.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap());
        StoredRecord {
            id: id.to_string(),
            content: id.to_string(),
            embedding: vec![0.0],
            name: "Unnamed Block".to_string(),
            session_id: session.to_string(),
            external_id: None,
            tags,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_sessions_sorted_by_last_update_then_id() {
        let records = vec![
            record("1", "alpha", StoredTags::default(), Some(1)),
            record("2", "beta", StoredTags::default(), Some(5)),
            record("3", "alpha", StoredTags::default(), Some(3)),
            record("4", "gamma", StoredTags::default(), Some(3)),
            record("5", "undated", StoredTags::default(), None),
            record("6", "  ", StoredTags::default(), Some(9)),
        ];

        let sessions = summarize_sessions(&records);
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["beta", "alpha", "gamma", "undated"]);
        assert_eq!(sessions[1].memory_count, 2);
        assert_eq!(
            sessions[1].last_updated,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap())
        );
        assert!(sessions[3].last_updated.is_none());
    }

    #[test]
    fn test_tags_counted_across_shapes() {
        let records = vec![
            record("1", "s", StoredTags::List(vec!["b".into(), "a".into()]), None),
            record("2", "s", StoredTags::Json(r#"["a"]"#.into()), None),
            record("3", "s", StoredTags::Joined("a,c".into()), None),
            record("4", "s", StoredTags::Json("[broken".into()), None),
        ];

        let tags = count_tags(&records);
        assert_eq!(
            tags,
            vec![
                TagSummary { tag: "a".into(), count: 3 },
                TagSummary { tag: "b".into(), count: 1 },
                TagSummary { tag: "c".into(), count: 1 },
            ]
        );
    }
}
