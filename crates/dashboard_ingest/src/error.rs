//! Error types for the ingest pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Ingest error type
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] dashboard_db::DbError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid log glob: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Parser '{parser_id}' is already running (lock held on {})", lock_path.display())]
    Locked { parser_id: String, lock_path: PathBuf },
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors that stop the whole invocation before any file is processed.
    ///
    /// Everything else is scoped to a single file and recorded in its outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::Config(_) | IngestError::Pattern(_) | IngestError::Locked { .. }
        )
    }
}

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;
