//! Opening the local store behind a CLI invocation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use statelock_server::config::Config;
use statelock_server::embedding;
use statelock_server::memory::{EngineConfig, MemoryEngine, SystemClock};
use statelock_server::storage::LanceStore;
use statelock_server::validation::Limits;

use crate::error::CliResult;

/// Engine plus the request limits from the same config
pub struct CliContext {
    pub engine: MemoryEngine,
    pub limits: Limits,
}

impl CliContext {
    pub fn new(engine: MemoryEngine, limits: Limits) -> Self {
        Self { engine, limits }
    }

    /// Load config, then open the LanceDB table under `data_dir` (or the
    /// configured data directory) with the configured embedder
    pub async fn open(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> CliResult<Self> {
        let mut config = Config::load(config_path)?;
        if let Some(dir) = data_dir {
            config.storage.data_dir = dir;
        }

        let embedder = embedding::from_config(&config.embedding)?;
        tracing::debug!(
            data_dir = %config.storage.data_dir.display(),
            embedder = embedder.name(),
            "Opening store"
        );

        let store = LanceStore::open_or_create(
            &config.storage.data_dir,
            &config.storage.table,
            embedder.dimension(),
        )
        .await?;

        let engine = MemoryEngine::new(
            Arc::new(store),
            embedder,
            Arc::new(SystemClock),
            EngineConfig::from(&config.query),
        );

        Ok(Self::new(engine, Limits::from(&config.limits)))
    }
}
