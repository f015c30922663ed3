//! Dataset file formats for the plutus tick data engine.
//!
//! - [`TickReader`] - Opens a dataset file as a lazy [`TickStream`]
//! - [`TickParquetWriter`] - Streams ticks into an optimized Parquet file
//! - [`read_footer`] - Reads optimized file metadata without touching row data

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod parquet;
mod reader;

pub use crate::csv::{CsvTickStream, parse_timestamp};
pub use crate::parquet::{
    OPTIMIZED_SCHEMA_VERSION, ParquetFooter, ParquetOptions, ParquetTickStream, SCHEMA_VERSION_KEY,
    SOURCE_FINGERPRINT_KEY, SOURCE_PATH_KEY, TickParquetWriter, read_footer, tick_schema,
};
pub use reader::{DEFAULT_BATCH_SIZE, ReadStats, TickReader, TickStream};
