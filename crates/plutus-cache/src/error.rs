//! Cache error types.

use plutus_types::PlutusError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, computing or persisting cache entries.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to create the cache directory.
    #[error("Failed to create cache directory '{}': {source}", path.display())]
    CreateDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write an entry.
    #[error("Failed to write cache entry '{}': {source}", path.display())]
    WriteFile {
        /// The entry path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to delete an entry.
    #[error("Failed to delete cache entry '{}': {source}", path.display())]
    DeleteFile {
        /// The entry path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to serialize an entry.
    #[error("Failed to serialize cache entry: {0}")]
    SerializeJson(#[from] serde_json::Error),

    /// The data file could not be read to compute its statistics.
    #[error(transparent)]
    Scan(#[from] PlutusError),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<CacheError> for PlutusError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Scan(e) => e,
            CacheError::SerializeJson(e) => Self::Json(e),
            CacheError::CreateDir { source, .. }
            | CacheError::WriteFile { source, .. }
            | CacheError::DeleteFile { source, .. } => Self::Io(source),
        }
    }
}
