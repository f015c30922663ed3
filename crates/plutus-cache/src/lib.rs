//! Persisted per-file statistics for the plutus tick data engine.
//!
//! - [`MetadataCache`] - Per-file locked arena of cache entries backed by JSON files
//! - [`MetadataCacheEntry`] - Timestamp bounds and row count of one dataset file
//! - [`CacheError`] - Errors raised while loading or persisting entries

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod entry;
mod error;

pub use cache::MetadataCache;
pub use entry::{CACHE_SCHEMA_VERSION, MetadataCacheEntry};
pub use error::{CacheError, Result};
