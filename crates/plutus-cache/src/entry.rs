//! Cache entries.

use chrono::{DateTime, NaiveDateTime, Utc};
use plutus_format::ReadStats;
use plutus_types::{Fingerprint, TimeRange};
use serde::{Deserialize, Serialize};

/// Version of the entry layout; entries written under another version are stale.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Statistics of one dataset file at a given fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataCacheEntry {
    /// Fingerprint of the file the statistics describe.
    pub fingerprint: Fingerprint,
    /// Earliest valid timestamp, `None` for a file without valid rows.
    pub min_timestamp: Option<NaiveDateTime>,
    /// Latest valid timestamp, `None` for a file without valid rows.
    pub max_timestamp: Option<NaiveDateTime>,
    /// Number of valid rows.
    pub row_count: u64,
    /// Entry layout version.
    pub schema_version: u32,
    /// For optimized files, the fingerprint of their raw source.
    pub source_fingerprint: Option<Fingerprint>,
    /// When the statistics were computed.
    pub recorded_at: DateTime<Utc>,
}

impl MetadataCacheEntry {
    /// Creates an entry stamped now with the current schema version.
    #[must_use]
    pub fn new(
        fingerprint: Fingerprint,
        bounds: Option<(NaiveDateTime, NaiveDateTime)>,
        row_count: u64,
    ) -> Self {
        Self {
            fingerprint,
            min_timestamp: bounds.map(|(min, _)| min),
            max_timestamp: bounds.map(|(_, max)| max),
            row_count,
            schema_version: CACHE_SCHEMA_VERSION,
            source_fingerprint: None,
            recorded_at: Utc::now(),
        }
    }

    /// Creates an entry from the counters of a complete read.
    #[must_use]
    pub fn from_stats(fingerprint: Fingerprint, stats: &ReadStats) -> Self {
        let bounds = stats.min_timestamp.zip(stats.max_timestamp);
        Self::new(fingerprint, bounds, stats.rows_read)
    }

    /// Sets the source fingerprint.
    #[must_use]
    pub const fn with_source_fingerprint(mut self, source: Option<Fingerprint>) -> Self {
        self.source_fingerprint = source;
        self
    }

    /// Returns true if the file holds no valid rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns true if the file may hold ticks inside `range`.
    #[must_use]
    pub fn may_overlap(&self, range: &TimeRange) -> bool {
        match (self.min_timestamp, self.max_timestamp) {
            (Some(min), Some(max)) => range.overlaps_closed(min, max),
            _ => false,
        }
    }

    /// Returns true if the entry describes the file at `fingerprint` under the
    /// current schema version.
    #[must_use]
    pub fn is_current(&self, fingerprint: &Fingerprint) -> bool {
        self.schema_version == CACHE_SCHEMA_VERSION && self.fingerprint == *fingerprint
    }
}
