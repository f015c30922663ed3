//! Optimized Parquet tick files.

use arrow::array::{
    Array, Float64Array, StringArray, TimestampNanosecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::ArrowWriter;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::basic::Compression;
use parquet::file::metadata::{KeyValue, ParquetMetaData};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use plutus_types::{
    DatasetFile, Fingerprint, PlutusError, Result, Tick, TickField, TickFields, Ticker, TradeSide,
};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::ReadStats;
use crate::reader::{RowTally, is_valid_price};

/// Footer key holding the optimized schema version.
pub const SCHEMA_VERSION_KEY: &str = "plutus.schema_version";
/// Footer key holding the fingerprint of the raw source file.
pub const SOURCE_FINGERPRINT_KEY: &str = "plutus.source_fingerprint";
/// Footer key holding the raw source file path.
pub const SOURCE_PATH_KEY: &str = "plutus.source_path";
/// Current optimized schema version.
pub const OPTIMIZED_SCHEMA_VERSION: u32 = 1;

const COL_TICKER: &str = "ticker";
const COL_TIMESTAMP: &str = "timestamp";
const COL_PRICE: &str = "price";
const COL_VOLUME: &str = "volume";
const COL_SIDE: &str = "side";
const COL_CUMULATIVE: &str = "cumulative_volume";

fn parquet_err(e: impl std::fmt::Display) -> PlutusError {
    PlutusError::Parquet(e.to_string())
}

/// Creates the Arrow schema for optimized tick files.
#[must_use]
pub fn tick_schema() -> Schema {
    Schema::new(vec![
        Field::new(COL_TICKER, DataType::Utf8, false),
        Field::new(
            COL_TIMESTAMP,
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            false,
        ),
        Field::new(COL_PRICE, DataType::Float64, false),
        Field::new(COL_VOLUME, DataType::UInt64, false),
        Field::new(COL_SIDE, DataType::Utf8, true),
        Field::new(COL_CUMULATIVE, DataType::UInt64, true),
    ])
}

/// Parquet writer settings.
#[derive(Debug, Clone)]
pub struct ParquetOptions {
    /// Row group size (number of rows per group).
    pub row_group_size: usize,
    /// Compression codec.
    pub compression: Compression,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            row_group_size: 100_000,
            compression: Compression::SNAPPY,
        }
    }
}

impl ParquetOptions {
    /// Sets the row group size.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Sets the compression codec.
    #[must_use]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Streams ticks into a Parquet file, one record batch at a time.
pub struct TickParquetWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: SchemaRef,
    buffer: Vec<Tick>,
    batch_size: usize,
    rows: u64,
}

impl<W: Write + Send> std::fmt::Debug for TickParquetWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickParquetWriter")
            .field("buffered", &self.buffer.len())
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> TickParquetWriter<W> {
    /// Creates a writer with the given footer key-value metadata.
    ///
    /// # Errors
    ///
    /// Returns a Parquet error if the writer cannot be created.
    pub fn new(sink: W, options: &ParquetOptions, metadata: Vec<(String, String)>) -> Result<Self> {
        let schema: SchemaRef = Arc::new(tick_schema());
        let kv = metadata
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect();
        let props = WriterProperties::builder()
            .set_compression(options.compression)
            .set_max_row_group_size(options.row_group_size)
            .set_key_value_metadata(Some(kv))
            .build();

        let writer =
            ArrowWriter::try_new(sink, schema.clone(), Some(props)).map_err(parquet_err)?;
        let batch_size = options.row_group_size.clamp(1, 65_536);

        Ok(Self {
            writer,
            schema,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            rows: 0,
        })
    }

    /// Buffers a tick, flushing a record batch when the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be encoded or written.
    pub fn write(&mut self, tick: Tick) -> Result<()> {
        self.buffer.push(tick);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Flushes buffered ticks, writes the footer, and returns the row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the final batch or the footer cannot be written.
    pub fn close(mut self) -> Result<u64> {
        self.flush()?;
        self.writer.close().map_err(parquet_err)?;
        Ok(self.rows)
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = ticks_to_batch(&self.schema, &self.buffer)?;
        self.writer.write(&batch).map_err(parquet_err)?;
        self.rows += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }
}

/// Converts ticks to an Arrow record batch.
fn ticks_to_batch(schema: &SchemaRef, ticks: &[Tick]) -> Result<RecordBatch> {
    let tickers: Vec<&str> = ticks.iter().map(|t| t.ticker.as_str()).collect();
    let timestamps = ticks
        .iter()
        .map(|t| {
            t.timestamp.and_utc().timestamp_nanos_opt().ok_or_else(|| {
                PlutusError::validation(format!(
                    "timestamp {} outside the nanosecond range",
                    t.timestamp
                ))
            })
        })
        .collect::<Result<Vec<i64>>>()?;
    let prices: Vec<f64> = ticks.iter().map(|t| t.matched_price).collect();
    let volumes: Vec<u64> = ticks.iter().map(|t| t.matched_volume).collect();
    let sides: Vec<Option<&str>> = ticks.iter().map(|t| t.side.map(|s| s.code())).collect();
    let cumulative: Vec<Option<u64>> = ticks.iter().map(|t| t.cumulative_volume).collect();

    RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(tickers)),
            Arc::new(TimestampNanosecondArray::from(timestamps)),
            Arc::new(Float64Array::from(prices)),
            Arc::new(UInt64Array::from(volumes)),
            Arc::new(StringArray::from(sides)),
            Arc::new(UInt64Array::from(cumulative)),
        ],
    )
    .map_err(parquet_err)
}

/// Metadata read from an optimized file's footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetFooter {
    /// Total rows in the file.
    pub num_rows: u64,
    /// Recorded optimized schema version.
    pub schema_version: Option<u32>,
    /// Fingerprint of the raw file the optimized file was built from.
    pub source_fingerprint: Option<Fingerprint>,
    /// Raw file path recorded at conversion time.
    pub source_path: Option<String>,
    /// Timestamp bounds from row-group statistics, when every group has them.
    pub timestamp_bounds: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// Reads the footer of an optimized file without decoding row data.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or a Parquet error if the
/// footer is invalid.
pub fn read_footer(path: &Path) -> Result<ParquetFooter> {
    let reader = SerializedFileReader::new(File::open(path)?).map_err(parquet_err)?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();
    let kv = file_meta.key_value_metadata();
    let lookup = |key: &str| {
        kv.and_then(|entries| entries.iter().find(|e| e.key == key))
            .and_then(|e| e.value.clone())
    };

    Ok(ParquetFooter {
        num_rows: u64::try_from(file_meta.num_rows()).unwrap_or(0),
        schema_version: lookup(SCHEMA_VERSION_KEY).and_then(|v| v.parse().ok()),
        source_fingerprint: lookup(SOURCE_FINGERPRINT_KEY).and_then(|v| Fingerprint::decode(&v)),
        source_path: lookup(SOURCE_PATH_KEY),
        timestamp_bounds: timestamp_bounds_from_stats(meta),
    })
}

/// Computes min/max timestamps from row-group statistics.
///
/// Returns `None` when any non-empty row group lacks statistics, so callers
/// fall back to a scan.
fn timestamp_bounds_from_stats(meta: &ParquetMetaData) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let idx = meta
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .position(|c| c.name() == COL_TIMESTAMP)?;

    let mut global: Option<(i64, i64)> = None;
    for rg in meta.row_groups() {
        if rg.num_rows() == 0 {
            continue;
        }
        let stats = rg.column(idx).statistics()?;
        let lo = le_bytes_to_i64(stats.min_bytes_opt()?)?;
        let hi = le_bytes_to_i64(stats.max_bytes_opt()?)?;
        global = Some(match global {
            Some((min, max)) => (min.min(lo), max.max(hi)),
            None => (lo, hi),
        });
    }

    global.map(|(lo, hi)| (nanos_to_naive(lo), nanos_to_naive(hi)))
}

fn le_bytes_to_i64(bytes: &[u8]) -> Option<i64> {
    let buf: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_le_bytes(buf))
}

fn nanos_to_naive(nanos: i64) -> NaiveDateTime {
    DateTime::from_timestamp_nanos(nanos).naive_utc()
}

/// Columns of one decoded record batch.
#[derive(Debug)]
struct TickColumns {
    ticker: StringArray,
    timestamp: TimestampNanosecondArray,
    price: Float64Array,
    volume: UInt64Array,
    side: Option<StringArray>,
    cumulative: Option<UInt64Array>,
}

impl TickColumns {
    fn from_batch(path: &Path, batch: &RecordBatch) -> Result<Self> {
        fn column<A: Array + Clone + 'static>(
            path: &Path,
            batch: &RecordBatch,
            name: &str,
        ) -> Result<Option<A>> {
            let Some(col) = batch.column_by_name(name) else {
                return Ok(None);
            };
            col.as_any()
                .downcast_ref::<A>()
                .cloned()
                .map(Some)
                .ok_or_else(|| PlutusError::Schema {
                    path: path.to_path_buf(),
                    reason: format!("column '{name}' has type {}", col.data_type()),
                })
        }
        let required = |name: &str| PlutusError::Schema {
            path: path.to_path_buf(),
            reason: format!("missing column '{name}'"),
        };

        Ok(Self {
            ticker: column(path, batch, COL_TICKER)?.ok_or_else(|| required(COL_TICKER))?,
            timestamp: column(path, batch, COL_TIMESTAMP)?
                .ok_or_else(|| required(COL_TIMESTAMP))?,
            price: column(path, batch, COL_PRICE)?.ok_or_else(|| required(COL_PRICE))?,
            volume: column(path, batch, COL_VOLUME)?.ok_or_else(|| required(COL_VOLUME))?,
            side: column(path, batch, COL_SIDE)?,
            cumulative: column(path, batch, COL_CUMULATIVE)?,
        })
    }

    fn len(&self) -> usize {
        self.timestamp.len()
    }

    fn tick(&self, i: usize, ticker: &Ticker) -> std::result::Result<Tick, String> {
        if self.ticker.is_null(i)
            || self.timestamp.is_null(i)
            || self.price.is_null(i)
            || self.volume.is_null(i)
        {
            return Err("null in a required column".to_string());
        }
        let symbol = self.ticker.value(i);
        if !ticker.matches(symbol) {
            return Err(format!(
                "ticker '{symbol}' does not match file ticker {ticker}"
            ));
        }

        let price = self.price.value(i);
        if !is_valid_price(price) {
            return Err(format!("invalid price '{price}'"));
        }

        let mut tick = Tick::new(
            ticker.clone(),
            nanos_to_naive(self.timestamp.value(i)),
            price,
            self.volume.value(i),
        );
        if let Some(side) = self.side.as_ref().filter(|a| a.is_valid(i)) {
            tick.side = Some(side.value(i).parse::<TradeSide>()?);
        }
        if let Some(cum) = self.cumulative.as_ref().filter(|a| a.is_valid(i)) {
            tick.cumulative_volume = Some(cum.value(i));
        }
        Ok(tick)
    }
}

/// Streaming reader over an optimized Parquet file.
pub struct ParquetTickStream {
    reader: Option<ParquetRecordBatchReader>,
    columns: Option<TickColumns>,
    row: usize,
    rows_before_batch: u64,
    ticker: Ticker,
    tally: RowTally,
}

impl std::fmt::Debug for ParquetTickStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetTickStream")
            .field("path", &self.tally.path())
            .field("open", &self.reader.is_some())
            .field("row", &(self.rows_before_batch + self.row as u64))
            .finish_non_exhaustive()
    }
}

impl ParquetTickStream {
    pub(crate) fn open(
        file: &DatasetFile,
        fields: TickFields,
        batch_size: usize,
        tally: RowTally,
    ) -> Result<Self> {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(File::open(&file.path)?).map_err(|e| {
                PlutusError::Schema {
                    path: file.path.clone(),
                    reason: e.to_string(),
                }
            })?;

        let schema = builder.schema().clone();
        let mut wanted = vec![COL_TICKER, COL_TIMESTAMP, COL_PRICE, COL_VOLUME];
        if fields.contains(TickField::Side) {
            wanted.push(COL_SIDE);
        }
        if fields.contains(TickField::CumulativeVolume) {
            wanted.push(COL_CUMULATIVE);
        }

        let mut indices = Vec::with_capacity(wanted.len());
        for name in wanted {
            match schema.index_of(name) {
                Ok(idx) => indices.push(idx),
                Err(_) if name == COL_SIDE || name == COL_CUMULATIVE => {}
                Err(_) => {
                    return Err(PlutusError::Schema {
                        path: file.path.clone(),
                        reason: format!("missing column '{name}'"),
                    });
                }
            }
        }

        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(batch_size.max(1))
            .build()
            .map_err(parquet_err)?;

        Ok(Self {
            reader: Some(reader),
            columns: None,
            row: 0,
            rows_before_batch: 0,
            ticker: file.ticker.clone(),
            tally,
        })
    }

    /// Returns the counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> ReadStats {
        self.tally.stats()
    }

    /// Returns the path of the file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.tally.path()
    }

    fn fail(&mut self, err: PlutusError) -> Option<Result<Tick>> {
        self.reader = None;
        self.columns = None;
        Some(Err(err))
    }
}

impl Iterator for ParquetTickStream {
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(columns) = &self.columns
                && self.row < columns.len()
            {
                let i = self.row;
                self.row += 1;
                match columns.tick(i, &self.ticker) {
                    Ok(tick) => {
                        self.tally.accept(&tick);
                        return Some(Ok(tick));
                    }
                    Err(reason) => {
                        let line = self.rows_before_batch + i as u64 + 1;
                        if let Some(err) = self.tally.reject(line, reason) {
                            return self.fail(err);
                        }
                        continue;
                    }
                }
            }

            if let Some(columns) = self.columns.take() {
                self.rows_before_batch += columns.len() as u64;
            }
            self.row = 0;

            let reader = self.reader.as_mut()?;
            match reader.next() {
                Some(Ok(batch)) => match TickColumns::from_batch(self.tally.path(), &batch) {
                    Ok(columns) => self.columns = Some(columns),
                    Err(e) => return self.fail(e),
                },
                Some(Err(e)) => return self.fail(parquet_err(e)),
                None => {
                    self.reader = None;
                    return self.tally.finish().map(Err);
                }
            }
        }
    }
}
