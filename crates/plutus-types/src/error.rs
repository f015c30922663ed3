//! Error types for plutus.

use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

use crate::Ticker;

/// Result type alias for plutus operations.
pub type Result<T> = std::result::Result<T, PlutusError>;

/// Errors that can occur while resolving, reading, aggregating or optimizing data.
#[derive(Error, Debug)]
pub enum PlutusError {
    /// The dataset root is missing, invalid, or has no recognizable layout.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The ticker is not part of the catalog.
    #[error("Unknown ticker: {ticker}")]
    NotFound {
        /// The ticker that was requested.
        ticker: String,
    },

    /// The request was rejected before any I/O.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A single malformed row.
    #[error("Corrupt record in '{}' at line {line}: {reason}", path.display())]
    CorruptRecord {
        /// File containing the row.
        path: PathBuf,
        /// 1-based line number (0 when unknown).
        line: u64,
        /// What was wrong with the row.
        reason: String,
    },

    /// Too many rows of a file were skipped as corrupt.
    #[error(
        "Data quality error in '{}': {skipped} of {seen} rows corrupt (max ratio {max_ratio})",
        path.display()
    )]
    DataQuality {
        /// File being read.
        path: PathBuf,
        /// Rows skipped so far.
        skipped: u64,
        /// Rows seen so far (valid and skipped).
        seen: u64,
        /// Configured skip ratio threshold.
        max_ratio: f64,
    },

    /// A tick arrived for a bucket earlier than the currently open one.
    #[error("Out-of-order tick for {ticker}: bucket {bucket} precedes open bucket {open_bucket}")]
    Ordering {
        /// Ticker being aggregated.
        ticker: Ticker,
        /// Bucket of the offending tick.
        bucket: NaiveDateTime,
        /// Bucket that was open when the tick arrived.
        open_bucket: NaiveDateTime,
    },

    /// The file layout or header cannot be interpreted at all.
    #[error("Schema error in '{}': {reason}", path.display())]
    Schema {
        /// File with the bad schema.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// Another writer holds the conversion lock for this file.
    #[error("File is locked by another writer: '{}'", path.display())]
    Locked {
        /// The locked target path.
        path: PathBuf,
    },

    /// The operation was cancelled before it started.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/Parquet error.
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlutusError {
    /// Returns true if the error is row-local and the read may continue.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::CorruptRecord { .. })
    }

    /// Creates a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_record_display() {
        let err = PlutusError::CorruptRecord {
            path: PathBuf::from("/data/FPT/2021-01-04.csv"),
            line: 7,
            reason: "invalid price 'abc'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2021-01-04.csv"));
        assert!(msg.contains("line 7"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_not_found_is_fatal() {
        let err = PlutusError::NotFound {
            ticker: "ZZZZ".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Unknown ticker: ZZZZ");
    }
}
