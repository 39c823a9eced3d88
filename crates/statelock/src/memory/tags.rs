//! Tag decoding across the storage shapes seen in existing data
//!
//! Records written by this crate carry a JSON array in `tags_json`. Older
//! rows may instead hold a native list, a JSON array in the legacy `tags`
//! field, or a comma-joined string. Decoding never fails: anything that
//! cannot be read yields an empty tag list.

use tracing::warn;

/// A tag set as it was found in storage, before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTags {
    /// Native list, already decoded
    List(Vec<String>),
    /// JSON array encoded as text
    Json(String),
    /// Comma-joined plain text
    Joined(String),
}

impl Default for StoredTags {
    fn default() -> Self {
        StoredTags::List(Vec::new())
    }
}

impl StoredTags {
    /// Classify free text of unknown shape.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim_start().starts_with('[') {
            StoredTags::Json(raw.to_string())
        } else {
            StoredTags::Joined(raw.to_string())
        }
    }

    /// Pick the tag source for a row holding both the canonical
    /// `tags_json` column and the legacy `tags` column.
    ///
    /// A readable `tags_json` wins; otherwise the legacy column is used.
    pub fn from_columns(tags_json: Option<&str>, legacy: Option<&str>) -> Self {
        if let Some(json) = tags_json.filter(|s| !s.trim().is_empty()) {
            if let Some(tags) = parse_json_array(json) {
                return StoredTags::List(tags);
            }
            warn!(raw = %json, "Unreadable tags_json column, falling back to legacy tags");
        }

        match legacy.filter(|s| !s.trim().is_empty()) {
            Some(raw) => StoredTags::from_text(raw),
            None => StoredTags::default(),
        }
    }

    /// Decode into an ordered tag list. Order is preserved and duplicates
    /// are kept.
    pub fn decode(&self) -> Vec<String> {
        match self {
            StoredTags::List(tags) => tags.clone(),
            StoredTags::Json(raw) => parse_json_array(raw).unwrap_or_else(|| {
                warn!(raw = %raw, "Malformed JSON tag list, treating as empty");
                Vec::new()
            }),
            StoredTags::Joined(raw) => raw
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Canonical JSON encoding used when writing
    pub fn encode(tags: &[String]) -> String {
        serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
    }
}

impl From<Vec<String>> for StoredTags {
    fn from(tags: Vec<String>) -> Self {
        StoredTags::List(tags)
    }
}

/// Parse a JSON array, stringifying non-string scalars. `None` when the
/// text is not a JSON array.
fn parse_json_array(raw: &str) -> Option<Vec<String>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
    Some(
        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
    )
}
