//! Dataset catalog for the plutus tick data engine.
//!
//! - [`DatasetCatalog`] - Scans a dataset root and resolves files for a query
//! - [`CoverageSlot`] - The raw and optimized files for one declared coverage
//!
//! # Example
//!
//! ```no_run
//! use plutus_catalog::DatasetCatalog;
//! use plutus_types::{DatasetRoot, FormatPreference, TimeRange};
//! # fn main() -> plutus_types::Result<()> {
//! let root = DatasetRoot::new("/data/ticks")?;
//! let catalog = DatasetCatalog::shared(&root)?;
//! # let range: TimeRange = todo!();
//! for file in catalog.resolve("FPT", &range, FormatPreference::Auto)? {
//!     println!("{}", file.path.display());
//! }
//! # Ok(())
//! # }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod slot;

pub use catalog::DatasetCatalog;
pub use slot::CoverageSlot;
