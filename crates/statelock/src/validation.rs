//! Request limits enforced before the engine sees a request

use crate::config::LimitsConfig;
use crate::error::{Result, StateLockError};
use crate::memory::types::{
    HybridMemoryQuery, MemoryQuery, MemoryUpsert, NewMemory, RestoreItem,
};

/// Length and count limits for incoming requests.
///
/// Lengths count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_content_chars: usize,
    pub max_name_chars: usize,
    pub max_session_chars: usize,
    pub max_tags: usize,
    pub max_tag_chars: usize,
    pub max_top_k: usize,
    pub max_candidate_k: usize,
    pub max_snapshot_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_content_chars: config.max_content_chars,
            max_name_chars: config.max_name_chars,
            max_session_chars: config.max_session_chars,
            max_tags: config.max_tags,
            max_tag_chars: config.max_tag_chars,
            max_top_k: config.max_top_k,
            max_candidate_k: config.max_candidate_k,
            max_snapshot_limit: config.max_snapshot_limit,
        }
    }
}

fn invalid(message: impl Into<String>) -> StateLockError {
    StateLockError::Validation(message.into())
}

impl Limits {
    pub fn check_new(&self, memory: &NewMemory) -> Result<()> {
        self.check_fields(
            &memory.content,
            memory.name.as_deref(),
            &memory.session_id,
            &memory.tags,
        )
    }

    pub fn check_upsert(&self, upsert: &MemoryUpsert) -> Result<()> {
        if let Some(id) = upsert.id.as_deref() {
            self.check_id(id)?;
        }
        self.check_fields(
            &upsert.content,
            upsert.name.as_deref(),
            &upsert.session_id,
            &upsert.tags,
        )
    }

    pub fn check_restore_item(&self, item: &RestoreItem) -> Result<()> {
        if let Some(id) = item.id.as_deref() {
            self.check_id(id)?;
        }
        self.check_content(&item.content)?;
        self.check_name(item.name.as_deref())?;
        self.check_tags(&item.tags)
    }

    pub fn check_query(&self, query: &MemoryQuery) -> Result<()> {
        self.check_query_text(&query.query_text)?;
        self.check_optional_session(query.session_id.as_deref())?;
        self.check_top_k(query.top_k, self.max_top_k, "top_k")
    }

    pub fn check_hybrid(&self, query: &HybridMemoryQuery) -> Result<()> {
        self.check_query_text(&query.query_text)?;
        self.check_optional_session(query.session_id.as_deref())?;
        self.check_top_k(query.top_k, self.max_top_k, "top_k")?;
        self.check_top_k(query.candidate_k, self.max_candidate_k, "candidate_k")?;
        check_weight(query.similarity_weight, "similarity_weight")?;
        check_weight(query.recency_weight, "recency_weight")
    }

    /// `limit` must be in `1..=max`
    pub fn check_page(&self, limit: usize, max: usize) -> Result<()> {
        if limit == 0 || limit > max {
            return Err(invalid(format!("limit must be between 1 and {max}")));
        }
        Ok(())
    }

    pub fn check_snapshot_limit(&self, limit: usize) -> Result<()> {
        self.check_top_k(limit, self.max_snapshot_limit, "limit")
    }

    pub fn check_session(&self, session_id: &str) -> Result<()> {
        if session_id.is_empty() {
            return Err(invalid("session_id must not be empty"));
        }
        if session_id.chars().count() > self.max_session_chars {
            return Err(invalid(format!(
                "session_id must be at most {} characters",
                self.max_session_chars
            )));
        }
        Ok(())
    }

    /// An empty filter is the same as no filter
    fn check_optional_session(&self, session_id: Option<&str>) -> Result<()> {
        match session_id {
            Some(session_id) if !session_id.is_empty() => self.check_session(session_id),
            _ => Ok(()),
        }
    }

    fn check_fields(
        &self,
        content: &str,
        name: Option<&str>,
        session_id: &str,
        tags: &[String],
    ) -> Result<()> {
        self.check_content(content)?;
        self.check_name(name)?;
        self.check_session(session_id)?;
        self.check_tags(tags)
    }

    fn check_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(invalid("id must not be empty when supplied"));
        }
        Ok(())
    }

    fn check_content(&self, content: &str) -> Result<()> {
        if content.is_empty() {
            return Err(invalid("content must not be empty"));
        }
        if content.chars().count() > self.max_content_chars {
            return Err(invalid(format!(
                "content must be at most {} characters",
                self.max_content_chars
            )));
        }
        Ok(())
    }

    fn check_name(&self, name: Option<&str>) -> Result<()> {
        if let Some(name) = name {
            if name.chars().count() > self.max_name_chars {
                return Err(invalid(format!(
                    "name must be at most {} characters",
                    self.max_name_chars
                )));
            }
        }
        Ok(())
    }

    fn check_tags(&self, tags: &[String]) -> Result<()> {
        if tags.len() > self.max_tags {
            return Err(invalid(format!("at most {} tags are allowed", self.max_tags)));
        }
        if let Some(tag) = tags
            .iter()
            .find(|tag| tag.chars().count() > self.max_tag_chars)
        {
            return Err(invalid(format!(
                "tag '{tag}' exceeds {} characters",
                self.max_tag_chars
            )));
        }
        Ok(())
    }

    fn check_query_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(invalid("query_text must not be empty"));
        }
        if text.chars().count() > self.max_content_chars {
            return Err(invalid(format!(
                "query_text must be at most {} characters",
                self.max_content_chars
            )));
        }
        Ok(())
    }

    fn check_top_k(&self, value: usize, max: usize, field: &str) -> Result<()> {
        if value == 0 || value > max {
            return Err(invalid(format!("{field} must be between 1 and {max}")));
        }
        Ok(())
    }
}

fn check_weight(weight: f64, field: &str) -> Result<()> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(invalid(format!("{field} must be between 0 and 1")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_minimal_record() {
        let limits = Limits::default();
        assert!(limits.check_new(&NewMemory::new("x")).is_ok());
    }

    #[test]
    fn test_rejects_empty_content_and_session() {
        let limits = Limits::default();
        assert!(limits.check_new(&NewMemory::new("")).is_err());
        assert!(
            limits
                .check_new(&NewMemory::new("x").with_session(""))
                .is_err()
        );
    }

    #[test]
    fn test_length_limits_count_chars() {
        let limits = Limits {
            max_content_chars: 3,
            ..Limits::default()
        };
        // three characters, nine bytes
        assert!(limits.check_new(&NewMemory::new("日本語")).is_ok());
        assert!(limits.check_new(&NewMemory::new("abcd")).is_err());
    }

    #[test]
    fn test_tag_limits() {
        let limits = Limits::default();
        let too_many = NewMemory::new("x").with_tags((0..21).map(|i| format!("t{i}")));
        assert!(limits.check_new(&too_many).is_err());

        let too_long = NewMemory::new("x").with_tags(["a".repeat(65)]);
        assert!(limits.check_new(&too_long).is_err());

        let ok = NewMemory::new("x").with_tags(["a".repeat(64)]);
        assert!(limits.check_new(&ok).is_ok());
    }

    #[test]
    fn test_name_limit() {
        let limits = Limits::default();
        let upsert = MemoryUpsert::new("x").with_name("n".repeat(121));
        assert!(limits.check_upsert(&upsert).is_err());
    }

    #[test]
    fn test_query_bounds() {
        let limits = Limits::default();
        assert!(limits.check_query(&MemoryQuery::new("sky").top_k(100)).is_ok());
        assert!(limits.check_query(&MemoryQuery::new("sky").top_k(101)).is_err());
        assert!(limits.check_query(&MemoryQuery::new("sky").top_k(0)).is_err());
        assert!(limits.check_query(&MemoryQuery::new("  ")).is_err());
    }

    #[test]
    fn test_hybrid_bounds() {
        let limits = Limits::default();
        let base = HybridMemoryQuery::new("sky");
        assert!(limits.check_hybrid(&base).is_ok());
        assert!(limits.check_hybrid(&base.clone().candidate_k(501)).is_err());
        assert!(limits.check_hybrid(&base.clone().weights(1.5, 0.0)).is_err());
        assert!(limits.check_hybrid(&base.clone().weights(-0.1, 0.5)).is_err());
        assert!(limits.check_hybrid(&base.clone().weights(f64::NAN, 0.5)).is_err());
        // a zero sum passes here; the engine rejects it
        assert!(limits.check_hybrid(&base.weights(0.0, 0.0)).is_ok());
    }

    #[test]
    fn test_page_and_snapshot_limits() {
        let limits = Limits::default();
        assert!(limits.check_page(500, 500).is_ok());
        assert!(limits.check_page(501, 500).is_err());
        assert!(limits.check_page(0, 500).is_err());
        assert!(limits.check_snapshot_limit(10_000).is_ok());
        assert!(limits.check_snapshot_limit(10_001).is_err());
    }
}
