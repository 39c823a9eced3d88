use std::io;
use std::path::PathBuf;

use statelock_server::StateLockError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] StateLockError),

    #[error("Failed to read {}: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Import file is neither a snapshot nor a list of memories: {0}")]
    Import(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Process exit code: 2 for bad invocations, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Engine(e) if e.kind() == statelock_server::error::ErrorKind::Validation => 2,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
