//! OHLC aggregation for the plutus tick data engine.
//!
//! This crate provides tick-to-bar aggregation:
//!
//! - [`Bar`] - OHLC bar data structure
//! - [`IntervalBucketer`] - Aligned bucket start for a timestamp
//! - [`OhlcAggregator`] - Streaming tick aggregator
//! - [`BarAggregator`] - Re-buckets bars into a coarser interval

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod bar;
mod bucket;

pub use aggregator::{BarAggregator, OhlcAggregator};
pub use bar::Bar;
pub use bucket::IntervalBucketer;
