//! Tick data access, range filtering and OHLC aggregation.
//!
//! This is a facade crate that re-exports functionality from the plutus
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```no_run
//! use plutus_lib::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let root = DatasetRoot::new("/data/ticks")?;
//!     let engine = QueryEngine::new(EngineConfig::new(root))?;
//!
//!     let range = TimeRange::days(
//!         chrono::NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
//!         chrono::NaiveDate::from_ymd_opt(2021, 1, 5).unwrap(),
//!     )?;
//!     let spec = QuerySpec::ohlc("FPT", range, Interval::Minute1);
//!
//!     if let QueryOutput::Bars(bars) = engine.query(&spec)? {
//!         for bar in bars {
//!             println!("{:?}", bar?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use plutus_types::*;

// Re-export catalog and cache
pub use plutus_cache::{CACHE_SCHEMA_VERSION, CacheError, MetadataCache, MetadataCacheEntry};
pub use plutus_catalog::{CoverageSlot, DatasetCatalog};

// Re-export file formats
pub use plutus_format::{
    DEFAULT_BATCH_SIZE, ParquetFooter, ParquetOptions, ReadStats, TickParquetWriter, TickReader,
    TickStream, read_footer,
};

// Re-export aggregation
pub use plutus_aggregate::{Bar, BarAggregator, IntervalBucketer, OhlcAggregator};

// Re-export queries
#[cfg(feature = "query")]
pub use plutus_query::{
    BarQuery, EngineConfig, QueryEngine, QueryOutput, QueryStats, RangeFilter, TickQuery, filter,
};

// Re-export optimization
#[cfg(feature = "optimize")]
pub use plutus_optimize::{
    CancelFlag, FileStatus, FileTask, FormatOptimizer, OptimizeOptions, OptimizeOutcome,
    OptimizeProgress, OptimizeRun, OptimizeSummary, OptimizedFile, RunId, RunStatus, load_run,
    optimize_dataset,
};

/// Prelude module for convenient imports.
///
/// ```
/// use plutus_lib::prelude::*;
/// ```
pub mod prelude {
    pub use plutus_types::{
        CorruptPolicy, DatasetFile, DatasetRoot, FormatPreference, Interval, PlutusError,
        Projection, QueryMode, QuerySpec, Result, SessionPolicy, Tick, Ticker, TimeRange,
    };

    pub use plutus_aggregate::{Bar, OhlcAggregator};
    pub use plutus_catalog::DatasetCatalog;
    pub use plutus_format::TickReader;

    #[cfg(feature = "query")]
    pub use plutus_query::{EngineConfig, QueryEngine, QueryOutput, QueryStats};

    #[cfg(feature = "optimize")]
    pub use plutus_optimize::{CancelFlag, OptimizeOptions, OptimizeProgress, optimize_dataset};
}
