use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, StateLockError};

/// Environment variable that overrides `server.api_key`
pub const API_KEY_ENV: &str = "STATELOCK_API_KEY";

/// Main configuration structure for StateLock
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Record store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Ranking and snapshot tuning
    #[serde(default)]
    pub query: QueryConfig,
    /// Boundary limits applied before requests reach the engine
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StateLockError::Config(format!("Failed to parse config: {e}")))?;
        config.query.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StateLockError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load from an explicit path, or the first default location that exists,
    /// or built-in defaults. Environment overrides are applied last.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            Self::from_file(path)?
        } else {
            match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    tracing::info!("Loading config from: {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            }
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.apply_api_key_override(&key);
        }

        Ok(config)
    }

    fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".statelock").join("config.toml")),
            dirs::config_dir().map(|c| c.join("statelock").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn apply_api_key_override(&mut self, key: &str) {
        let key = key.trim();
        if !key.is_empty() {
            self.server.api_key = key.to_string();
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the LanceDB database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Table holding memory records
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            table: default_table(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".statelock"))
        .unwrap_or_else(|| PathBuf::from(".statelock"))
}

fn default_table() -> String {
    "memory_blocks".to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Require the `X-Statelock-Api-Key` header on every memory route
    #[serde(default)]
    pub auth_required: bool,
    /// Expected API key when auth is required
    #[serde(default)]
    pub api_key: String,
    /// Page size used when a list request has no limit
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Upper bound for any list request limit
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            auth_required: false,
            api_key: String::new(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    500
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// `local` (fastembed model) or `hash` (deterministic fallback)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name for the local provider
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector dimension for the hash provider
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            hash_dimension: default_hash_dimension(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_hash_dimension() -> usize {
    256
}

/// Ranking and snapshot tuning
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Hybrid queries over-fetch `top_k * candidate_multiplier` candidates
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Hard ceiling on the hybrid candidate pool
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Largest page requested from the store while snapshotting
    #[serde(default = "default_snapshot_batch_size")]
    pub snapshot_batch_size: usize,
    /// Window used for the "recent writes" statistic
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: i64,
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        recent_window(self.recent_window_hours).map(|_| ())
    }
}

/// The recent-writes window as a duration; must be positive and fit a
/// `chrono::Duration`
pub fn recent_window(hours: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_hours(hours)
        .filter(|_| hours > 0)
        .ok_or_else(|| {
            StateLockError::Config(format!(
                "recent_window_hours must be a positive number of hours, got {hours}"
            ))
        })
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            candidate_multiplier: default_candidate_multiplier(),
            max_candidates: default_max_candidates(),
            snapshot_batch_size: default_snapshot_batch_size(),
            recent_window_hours: default_recent_window_hours(),
        }
    }
}

fn default_candidate_multiplier() -> usize {
    5
}

fn default_max_candidates() -> usize {
    500
}

fn default_snapshot_batch_size() -> usize {
    500
}

fn default_recent_window_hours() -> i64 {
    24
}

/// Boundary limits for incoming requests
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_max_name_chars")]
    pub max_name_chars: usize,
    #[serde(default = "default_max_session_chars")]
    pub max_session_chars: usize,
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default = "default_max_tag_chars")]
    pub max_tag_chars: usize,
    /// Upper bound for `top_k` on plain and hybrid queries
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Upper bound for the hybrid candidate pool request
    #[serde(default = "default_max_candidate_k")]
    pub max_candidate_k: usize,
    #[serde(default = "default_max_snapshot_limit")]
    pub max_snapshot_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            max_name_chars: default_max_name_chars(),
            max_session_chars: default_max_session_chars(),
            max_tags: default_max_tags(),
            max_tag_chars: default_max_tag_chars(),
            max_top_k: default_max_top_k(),
            max_candidate_k: default_max_candidate_k(),
            max_snapshot_limit: default_max_snapshot_limit(),
        }
    }
}

fn default_max_content_chars() -> usize {
    12_000
}

fn default_max_name_chars() -> usize {
    120
}

fn default_max_session_chars() -> usize {
    160
}

fn default_max_tags() -> usize {
    20
}

fn default_max_tag_chars() -> usize {
    64
}

fn default_max_top_k() -> usize {
    100
}

fn default_max_candidate_k() -> usize {
    500
}

fn default_max_snapshot_limit() -> usize {
    10_000
}
