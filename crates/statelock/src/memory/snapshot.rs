//! Bulk export and import of a single session

use tracing::{info, warn};

use crate::error::{Result, StateLockError};
use crate::memory::engine::MemoryEngine;
use crate::memory::types::{MemoryRecord, RestoreItem, RestoreMode, SessionSnapshot};

impl MemoryEngine {
    /// Export up to `limit` records of a session.
    ///
    /// Reads in batches of `min(limit, snapshot_batch_size)` because stores
    /// may cap a single page below the caller's limit. A short batch ends
    /// the scan.
    pub async fn snapshot(&self, session_id: &str, limit: usize) -> Result<SessionSnapshot> {
        if session_id.is_empty() {
            return Err(StateLockError::Validation(
                "session_id must not be empty".to_string(),
            ));
        }

        let batch_size = limit.min(self.config().snapshot_batch_size);
        let mut memories: Vec<MemoryRecord> = Vec::new();

        if batch_size > 0 {
            let mut offset = 0;
            while memories.len() < limit {
                let batch = self
                    .list(Some(session_id), batch_size, offset)
                    .await
                    .map_err(|e| e.context(format!("snapshot {session_id}")))?;

                let fetched = batch.len();
                memories.extend(batch);
                if fetched < batch_size {
                    break;
                }
                offset += fetched;
            }
        }
        memories.truncate(limit);

        info!(session = session_id, total = memories.len(), "Exported session");

        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            exported_at: self.clock().now(),
            total: memories.len(),
            memories,
        })
    }

    /// Load records into a session, one upsert per item.
    ///
    /// Every item is written under `session_id` regardless of what the
    /// payload says. `Replace` deletes the session first, so restored
    /// records get a fresh `created_at`. Not atomic: on failure the error
    /// reports how many items were written before it.
    pub async fn restore(
        &self,
        session_id: &str,
        mode: RestoreMode,
        items: Vec<RestoreItem>,
    ) -> Result<usize> {
        if session_id.is_empty() {
            return Err(StateLockError::Validation(
                "session_id must not be empty".to_string(),
            ));
        }

        if mode == RestoreMode::Replace {
            self.delete_session(session_id).await?;
        }

        let total = items.len();
        let mut restored = 0;
        for item in items {
            if let Err(e) = self.upsert(item.into_upsert(session_id)).await {
                warn!(
                    session = session_id,
                    restored,
                    total,
                    error = %e,
                    "Restore stopped early"
                );
                return Err(e.context(format!(
                    "restore {session_id}: restored {restored} of {total} before failure"
                )));
            }
            restored += 1;
        }

        info!(
            session = session_id,
            mode = mode.as_str(),
            restored,
            "Restored session"
        );
        Ok(restored)
    }
}
