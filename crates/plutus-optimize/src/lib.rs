//! Raw to columnar conversion for plutus datasets.
//!
//! - [`FormatOptimizer`] - Converts one raw file, idempotently and atomically
//! - [`optimize_dataset`] - Converts every raw file of a dataset on a worker pool
//! - [`OptimizeProgress`] - Shared run state with periodic checkpoints to disk
//! - [`CancelFlag`] - Cooperative cancellation checked before each file
//! - [`OptimizeRun`] - Persisted report of a run

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/plutus-data/plutus/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod optimizer;
mod pipeline;
mod progress;
mod run;

pub use cancel::CancelFlag;
pub use optimizer::{FormatOptimizer, OptimizeOptions, OptimizeOutcome, OptimizedFile};
pub use pipeline::{OptimizeSummary, optimize_dataset};
pub use progress::{OptimizeProgress, checkpoint_path, load_run};
pub use run::{FileStatus, FileTask, OptimizeRun, RunId, RunStatus};
