//! Query execution for the plutus tick data engine.
//!
//! - [`QueryEngine`] - Resolves, prunes, reads and aggregates one query at a time
//! - [`EngineConfig`] - Dataset root and read policies of an engine
//! - [`RangeFilter`] - Narrows a tick stream to a half-open range
//! - [`QueryOutput`] - Lazy ticks or bars, with [`QueryStats`]

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod engine;
mod filter;
mod output;

pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use filter::{RangeFilter, filter};
pub use output::{BarQuery, QueryOutput, QueryStats, TickQuery};
