//! Filter types for record store operations
//!
//! A filter narrows list, count, delete and similarity operations. Stores
//! that speak SQL render it with [`RecordFilter::to_sql_clause`]; in-process
//! stores evaluate it with [`RecordFilter::matches`].

use crate::storage::StoredRecord;

/// Filter criteria for record store operations.
///
/// All fields are optional; `None` means that condition is not applied.
/// Conditions combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records in this session
    pub session_id: Option<String>,
    /// Only records whose id is in this set
    pub ids: Option<Vec<String>>,
}

impl RecordFilter {
    /// Create a new empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter to a single session
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self::new().with_session(session_id)
    }

    /// Filter to an optional session; blank ids are treated as no filter
    pub fn for_optional_session(session_id: Option<&str>) -> Self {
        match session_id.filter(|s| !s.is_empty()) {
            Some(session_id) => Self::for_session(session_id),
            None => Self::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Build a SQL WHERE clause from this filter.
    /// Returns `None` if no filters are set.
    pub fn to_sql_clause(&self) -> Option<String> {
        let mut conditions = Vec::new();

        if let Some(ref session_id) = self.session_id {
            conditions.push(format!("session_id = {}", quote(session_id)));
        }

        if let Some(ref ids) = self.ids {
            if ids.is_empty() {
                // IN () is not valid SQL; an empty id set matches nothing
                conditions.push("1 = 0".to_string());
            } else if ids.len() == 1 {
                conditions.push(format!("id = {}", quote(&ids[0])));
            } else {
                let in_clause = ids.iter().map(|id| quote(id)).collect::<Vec<_>>().join(", ");
                conditions.push(format!("id IN ({in_clause})"));
            }
        }

        if conditions.is_empty() {
            None
        } else {
            Some(conditions.join(" AND "))
        }
    }

    /// Evaluate this filter against a record
    pub fn matches(&self, record: &StoredRecord) -> bool {
        if let Some(ref session_id) = self.session_id {
            if &record.session_id != session_id {
                return false;
            }
        }
        if let Some(ref ids) = self.ids {
            if !ids.iter().any(|id| id == &record.id) {
                return false;
            }
        }
        true
    }

    /// Check if this filter is empty (no conditions set)
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.ids.is_none()
    }
}

/// Single-quote a SQL string literal, doubling embedded quotes
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
