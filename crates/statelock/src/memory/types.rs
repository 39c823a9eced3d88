//! Memory types for the StateLock engine
//!
//! Defines the caller-facing request and response shapes. The persisted
//! form lives in [`crate::storage::StoredRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateLockError;

/// Session used when a caller does not supply one
pub const DEFAULT_SESSION_ID: &str = "default";

/// Name persisted for records created without one
pub const UNNAMED_BLOCK: &str = "Unnamed Block";

pub(crate) fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

/// Input for non-deterministic creation (`add`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            name: None,
            session_id: default_session_id(),
            tags: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for create-or-replace writes (`upsert`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUpsert {
    /// Explicit id; wins over any derived id
    #[serde(default)]
    pub id: Option<String>,
    /// Caller-stable key used to derive the id when `id` is absent
    #[serde(default)]
    pub external_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryUpsert {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            external_id: None,
            content: content.into(),
            name: None,
            session_id: default_session_id(),
            tags: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A stored memory as returned to callers. The embedding is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub name: Option<String>,
    pub session_id: String,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Timestamp used for "last written" comparisons
    pub fn last_written(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// A query hit. `distance` is set on every similarity result,
/// `score` only on hybrid results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMemory {
    #[serde(flatten)]
    pub record: MemoryRecord,
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Plain similarity query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub query_text: String,
    /// Restrict to one session; `None` searches every session
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl MemoryQuery {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            session_id: None,
            top_k: default_top_k(),
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Similarity query re-ranked by a similarity/recency blend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridMemoryQuery {
    pub query_text: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Requested candidate pool; the engine may fetch more
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
}

impl HybridMemoryQuery {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            session_id: None,
            top_k: default_top_k(),
            candidate_k: default_candidate_k(),
            similarity_weight: default_similarity_weight(),
            recency_weight: default_recency_weight(),
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn candidate_k(mut self, candidate_k: usize) -> Self {
        self.candidate_k = candidate_k;
        self
    }

    pub fn weights(mut self, similarity: f64, recency: f64) -> Self {
        self.similarity_weight = similarity;
        self.recency_weight = recency;
        self
    }
}

fn default_top_k() -> usize {
    3
}

fn default_candidate_k() -> usize {
    25
}

fn default_similarity_weight() -> f64 {
    0.8
}

fn default_recency_weight() -> f64 {
    0.2
}

/// One page of an ordered result set plus the total it was cut from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    /// Slice `[offset, offset + limit)` out of a fully ordered vector
    pub fn slice(ordered: Vec<T>, limit: usize, offset: usize) -> Self {
        let total = ordered.len();
        let items = ordered.into_iter().skip(offset).take(limit).collect();
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub memory_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOverview {
    pub total_memories: usize,
    pub total_sessions: usize,
    pub recent_writes_24h: usize,
    pub top_tags: Vec<TagSummary>,
}

/// Bulk export of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub exported_at: DateTime<Utc>,
    pub total: usize,
    pub memories: Vec<MemoryRecord>,
}

/// How `restore` treats records already in the target session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Upsert on top of existing records
    #[default]
    Append,
    /// Delete the session first, then upsert
    Replace,
}

impl RestoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RestoreMode::Append => "append",
            RestoreMode::Replace => "replace",
        }
    }
}

impl std::str::FromStr for RestoreMode {
    type Err = StateLockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(RestoreMode::Append),
            "replace" => Ok(RestoreMode::Replace),
            other => Err(StateLockError::Validation(format!(
                "Unknown restore mode: {other} (expected append or replace)"
            ))),
        }
    }
}

/// One record in a restore payload. Extra fields from an exported
/// snapshot (session, timestamps) are accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RestoreItem {
    pub(crate) fn into_upsert(self, session_id: &str) -> MemoryUpsert {
        MemoryUpsert {
            id: self.id,
            external_id: self.external_id,
            content: self.content,
            name: self.name,
            session_id: session_id.to_string(),
            tags: self.tags,
        }
    }
}

impl From<MemoryRecord> for RestoreItem {
    fn from(record: MemoryRecord) -> Self {
        Self {
            id: Some(record.id),
            external_id: record.external_id,
            content: record.content,
            name: record.name,
            tags: record.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_memory_defaults_session() {
        let memory: NewMemory = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(memory.session_id, DEFAULT_SESSION_ID);
        assert!(memory.name.is_none());
        assert!(memory.tags.is_empty());
    }

    #[test]
    fn test_hybrid_query_defaults() {
        let query: HybridMemoryQuery =
            serde_json::from_str(r#"{"query_text": "sky"}"#).unwrap();
        assert_eq!(query.top_k, 3);
        assert_eq!(query.candidate_k, 25);
        assert_eq!(query.similarity_weight, 0.8);
        assert_eq!(query.recency_weight, 0.2);
        assert!(query.session_id.is_none());
    }

    #[test]
    fn test_ranked_memory_flattens_record() {
        let ranked = RankedMemory {
            record: MemoryRecord {
                id: "mem_1".into(),
                content: "The sky is blue.".into(),
                name: None,
                session_id: "s1".into(),
                tags: vec!["nature".into()],
                external_id: None,
                created_at: None,
                updated_at: None,
            },
            distance: Some(0.25),
            score: None,
        };

        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["id"], "mem_1");
        assert_eq!(json["distance"], 0.25);
        assert!(json.get("score").is_none());
        assert!(json.get("external_id").is_none());
    }

    #[test]
    fn test_page_slice() {
        let page = Page::slice((0..10).collect::<Vec<_>>(), 3, 8);
        assert_eq!(page.items, vec![8, 9]);
        assert_eq!(page.total, 10);

        let empty = Page::slice((0..3).collect::<Vec<_>>(), 5, 10);
        assert!(empty.items.is_empty());
        assert_eq!(empty.total, 3);
    }

    #[test]
    fn test_restore_mode_parsing() {
        assert_eq!("append".parse::<RestoreMode>().unwrap(), RestoreMode::Append);
        assert_eq!("REPLACE".parse::<RestoreMode>().unwrap(), RestoreMode::Replace);
        assert!("merge".parse::<RestoreMode>().is_err());

        let mode: RestoreMode = serde_json::from_str(r#""replace""#).unwrap();
        assert_eq!(mode, RestoreMode::Replace);
        assert_eq!(RestoreMode::default(), RestoreMode::Append);
    }

    #[test]
    fn test_restore_item_accepts_snapshot_record() {
        let json = r#"{
            "id": "mem_abc",
            "content": "fact",
            "name": "Unnamed Block",
            "session_id": "old-session",
            "tags": ["a"],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null
        }"#;
        let item: RestoreItem = serde_json::from_str(json).unwrap();
        let upsert = item.into_upsert("new-session");
        assert_eq!(upsert.id.as_deref(), Some("mem_abc"));
        assert_eq!(upsert.session_id, "new-session");
        assert_eq!(upsert.tags, vec!["a".to_string()]);
    }
}
