//! Record identity
//!
//! Upserts without an explicit id get a digest id, so replaying the same
//! write lands on the same record.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::memory::types::MemoryUpsert;

/// Prefix of every derived id
pub const DERIVED_ID_PREFIX: &str = "mem_";

const DIGEST_HEX_CHARS: usize = 32;

/// Resolve the id an upsert writes to: explicit id, else a digest of the
/// external id, else a digest of `session|name|content`.
pub fn resolve_id(upsert: &MemoryUpsert) -> String {
    if let Some(id) = upsert.id.as_deref().filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    let base = match upsert.external_id.as_deref().filter(|e| !e.is_empty()) {
        Some(external_id) => external_id.to_string(),
        None => format!(
            "{}|{}|{}",
            upsert.session_id,
            upsert.name.as_deref().unwrap_or(""),
            upsert.content
        ),
    };

    derive_id(&base)
}

/// `mem_` plus the first 32 hex chars of SHA-256 over `base`
pub fn derive_id(base: &str) -> String {
    let digest = Sha256::digest(base.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{DERIVED_ID_PREFIX}{}", &hex[..DIGEST_HEX_CHARS])
}

/// Fresh id for non-deterministic creation
pub fn random_id() -> String {
    Uuid::new_v4().to_string()
}
