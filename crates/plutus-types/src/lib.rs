//! Core types for the plutus tick data engine.
//!
//! This crate provides the fundamental data structures used throughout plutus:
//!
//! - [`Tick`] - A single matched trade
//! - [`Interval`] - OHLC aggregation interval
//! - [`TimeRange`] - Half-open datetime range of a query
//! - [`DatasetFile`] - A raw or optimized data file in the catalog
//! - [`QuerySpec`] - A validated query request
//! - [`Projection`] - Requested output fields

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod dataset;
mod error;
mod fields;
mod interval;
mod query;
mod tick;
mod time_range;

pub use config::{CorruptAction, CorruptPolicy, FormatPreference, SessionPolicy};
pub use dataset::{DatasetFile, DatasetRoot, Fingerprint, STATE_DIR, StorageFormat};
pub use error::{PlutusError, Result};
pub use fields::{BarField, BarFields, Projection, TickField, TickFields};
pub use interval::{Interval, IntervalParseError};
pub use query::{QueryMode, QuerySpec};
pub use tick::{Tick, Ticker, TradeSide};
pub use time_range::{Coverage, TimeRange};
