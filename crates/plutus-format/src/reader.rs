//! Format-independent tick reader.

use chrono::NaiveDateTime;
use plutus_types::{
    CorruptAction, CorruptPolicy, DatasetFile, PlutusError, Result, StorageFormat, Tick,
    TickFields,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{CsvTickStream, ParquetTickStream};

/// Default number of rows per Parquet record batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Number of corrupt rows logged individually before sampling kicks in.
const WARN_FIRST: u64 = 5;

/// Returns true if `price` is a usable matched price.
pub(crate) fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

/// Counters for one pass over a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Valid rows emitted.
    pub rows_read: u64,
    /// Malformed rows skipped.
    pub rows_skipped: u64,
    /// Earliest timestamp emitted.
    pub min_timestamp: Option<NaiveDateTime>,
    /// Latest timestamp emitted.
    pub max_timestamp: Option<NaiveDateTime>,
    /// True once the stream reached the end of the file without a fatal error.
    pub exhausted: bool,
}

impl ReadStats {
    /// Rows seen, valid or not.
    #[must_use]
    pub const fn rows_seen(&self) -> u64 {
        self.rows_read + self.rows_skipped
    }
}

/// Opens dataset files as tick streams.
///
/// Each call to [`TickReader::open`] starts a fresh pass over the file.
#[derive(Debug, Clone)]
pub struct TickReader {
    file: DatasetFile,
    fields: TickFields,
    policy: CorruptPolicy,
    batch_size: usize,
}

impl TickReader {
    /// Creates a reader for `file` producing the requested fields.
    ///
    /// Core fields are always populated; optional fields only when requested.
    #[must_use]
    pub const fn new(file: DatasetFile, fields: TickFields, policy: CorruptPolicy) -> Self {
        Self {
            file,
            fields,
            policy,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the Parquet record batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Returns the file being read.
    #[must_use]
    pub const fn file(&self) -> &DatasetFile {
        &self.file
    }

    /// Opens a new stream over the file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened, or a schema error if
    /// its header or columns cannot be interpreted.
    pub fn open(&self) -> Result<TickStream> {
        debug!(
            path = %self.file.path.display(),
            format = %self.file.format,
            "opening dataset file"
        );
        let tally = RowTally::new(self.file.path.clone(), self.policy);
        match self.file.format {
            StorageFormat::Raw => {
                CsvTickStream::open(&self.file, self.fields, tally).map(TickStream::Csv)
            }
            StorageFormat::Optimized => {
                ParquetTickStream::open(&self.file, self.fields, self.batch_size, tally)
                    .map(TickStream::Parquet)
            }
        }
    }

    /// Reads the whole file, returning only the counters and bounds.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the pass.
    pub fn scan(&self) -> Result<ReadStats> {
        let mut stream = Self::new(self.file.clone(), TickFields::core(), self.policy)
            .with_batch_size(self.batch_size)
            .open()?;
        for tick in stream.by_ref() {
            tick?;
        }
        Ok(stream.close())
    }
}

/// A lazy stream of ticks from one file.
///
/// The underlying file handle is released as soon as the stream is exhausted,
/// fails, is closed, or is dropped. After a fatal error the stream yields
/// nothing further.
#[derive(Debug)]
pub enum TickStream {
    /// Stream over a raw CSV file.
    Csv(CsvTickStream),
    /// Stream over an optimized Parquet file.
    Parquet(ParquetTickStream),
}

impl TickStream {
    /// Returns the counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ReadStats {
        match self {
            Self::Csv(s) => s.stats(),
            Self::Parquet(s) => s.stats(),
        }
    }

    /// Returns the path of the file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Csv(s) => s.path(),
            Self::Parquet(s) => s.path(),
        }
    }

    /// Releases the file handle and returns the final counters.
    #[must_use]
    pub fn close(self) -> ReadStats {
        self.stats()
    }
}

impl Iterator for TickStream {
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Csv(s) => s.next(),
            Self::Parquet(s) => s.next(),
        }
    }
}

/// Row accounting shared by both formats.
#[derive(Debug)]
pub(crate) struct RowTally {
    path: PathBuf,
    policy: CorruptPolicy,
    stats: ReadStats,
}

impl RowTally {
    pub(crate) const fn new(path: PathBuf, policy: CorruptPolicy) -> Self {
        Self {
            path,
            policy,
            stats: ReadStats {
                rows_read: 0,
                rows_skipped: 0,
                min_timestamp: None,
                max_timestamp: None,
                exhausted: false,
            },
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) const fn stats(&self) -> ReadStats {
        self.stats
    }

    /// Records an emitted tick.
    pub(crate) fn accept(&mut self, tick: &Tick) {
        self.stats.rows_read += 1;
        let ts = tick.timestamp;
        self.stats.min_timestamp = Some(self.stats.min_timestamp.map_or(ts, |m| m.min(ts)));
        self.stats.max_timestamp = Some(self.stats.max_timestamp.map_or(ts, |m| m.max(ts)));
    }

    /// Records a malformed row, returning the error that ends the stream, if any.
    pub(crate) fn reject(&mut self, line: u64, reason: String) -> Option<PlutusError> {
        self.stats.rows_skipped += 1;
        let skipped = self.stats.rows_skipped;

        if self.policy.action == CorruptAction::Fail {
            return Some(PlutusError::CorruptRecord {
                path: self.path.clone(),
                line,
                reason,
            });
        }

        if skipped <= WARN_FIRST || skipped.is_power_of_two() {
            warn!(
                path = %self.path.display(),
                line,
                skipped,
                %reason,
                "skipping corrupt row"
            );
        }

        self.quality_error()
    }

    /// Marks the end of the file, returning a data quality error if the final
    /// ratio is over the threshold.
    pub(crate) fn finish(&mut self) -> Option<PlutusError> {
        self.stats.exhausted = true;
        let err = self.quality_error();
        if err.is_some() {
            self.stats.exhausted = false;
        }
        err
    }

    fn quality_error(&self) -> Option<PlutusError> {
        let seen = self.stats.rows_seen();
        let skipped = self.stats.rows_skipped;
        self.policy
            .exceeded(skipped, seen)
            .then(|| PlutusError::DataQuality {
                path: self.path.clone(),
                skipped,
                seen,
                max_ratio: self.policy.max_skip_ratio,
            })
    }
}
