//! Whole-dataset optimization runs.

use futures::stream::{self, StreamExt};
use plutus_catalog::DatasetCatalog;
use plutus_types::{DatasetFile, DatasetRoot, PlutusError, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    CancelFlag, FileStatus, FileTask, FormatOptimizer, OptimizeOptions, OptimizeOutcome,
    OptimizeProgress, RunId,
};

/// Totals of an optimization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeSummary {
    /// Run identifier, also the checkpoint file name.
    pub run_id: RunId,
    /// Files converted.
    pub converted: usize,
    /// Files whose optimized counterpart was already current.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
    /// Files not attempted because the run was cancelled.
    pub cancelled: usize,
    /// Rows written by conversions.
    pub rows_written: u64,
    /// Failed files with their error messages.
    pub failures: Vec<(PathBuf, String)>,
}

impl OptimizeSummary {
    /// Total files in the run.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.converted + self.skipped + self.failed + self.cancelled
    }

    /// Returns true if every file was processed without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Result of one worker.
enum FileResult {
    Done(OptimizeOutcome),
    Failed(PathBuf, String),
    Cancelled,
}

/// Optimizes every raw file under `root`.
///
/// Conversions run on blocking worker threads, at most
/// `options.concurrency` at a time. `cancel` is checked before each file;
/// conversions already running finish normally. Per-file failures are
/// counted in the summary and do not stop the run.
///
/// # Errors
///
/// Returns an error if the dataset cannot be scanned, or
/// [`PlutusError::Cancelled`] if cancellation was requested before the run
/// started.
pub async fn optimize_dataset(
    root: &DatasetRoot,
    options: OptimizeOptions,
    cancel: CancelFlag,
    progress: Arc<OptimizeProgress>,
) -> Result<OptimizeSummary> {
    if cancel.is_cancelled() {
        progress.mark_run_cancelled().await;
        return Err(PlutusError::Cancelled);
    }

    let catalog = match DatasetCatalog::scan(root) {
        Ok(catalog) => catalog,
        Err(e) => {
            progress.mark_run_failed().await;
            return Err(e);
        }
    };
    let files: Vec<DatasetFile> = catalog.raw_files().cloned().collect();
    let tasks = files
        .iter()
        .map(|f| FileTask::new(f.ticker.to_string(), f.path.clone(), f.optimized_path()))
        .collect();

    let concurrency = options.concurrency.max(1);
    progress.start(tasks, concurrency).await;
    info!(root = %root, files = files.len(), concurrency, "starting optimization run");

    let optimizer = Arc::new(FormatOptimizer::new(root.clone(), options));

    let results: Vec<FileResult> = stream::iter(files.into_iter().enumerate())
        .map(|(idx, file)| {
            let optimizer = Arc::clone(&optimizer);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    progress.mark_file_cancelled(idx).await;
                    return FileResult::Cancelled;
                }
                progress.mark_file_running(idx).await;

                let path = file.path.clone();
                let joined =
                    tokio::task::spawn_blocking(move || optimizer.optimize(&file)).await;
                let result = match joined {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("worker failed: {e}")),
                };

                match result {
                    Ok(outcome) => {
                        let status = if outcome.is_converted() {
                            FileStatus::Converted
                        } else {
                            FileStatus::Unchanged
                        };
                        let done = outcome.file();
                        progress
                            .mark_file_finished(idx, status, done.rows, done.rows_skipped)
                            .await;
                        FileResult::Done(outcome)
                    }
                    Err(message) => {
                        warn!(path = %path.display(), error = %message, "optimization failed");
                        progress.mark_file_failed(idx, &message).await;
                        FileResult::Failed(path, message)
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut summary = OptimizeSummary {
        run_id: progress.id().await,
        ..OptimizeSummary::default()
    };
    for result in results {
        match result {
            FileResult::Done(OptimizeOutcome::Converted(file)) => {
                summary.converted += 1;
                summary.rows_written += file.rows;
            }
            FileResult::Done(OptimizeOutcome::Unchanged(_)) => summary.skipped += 1,
            FileResult::Failed(path, message) => {
                summary.failed += 1;
                summary.failures.push((path, message));
            }
            FileResult::Cancelled => summary.cancelled += 1,
        }
    }
    summary.failures.sort();

    if summary.cancelled > 0 {
        progress.mark_run_cancelled().await;
    } else {
        progress.mark_run_completed().await;
    }

    info!(
        run = %summary.run_id,
        converted = summary.converted,
        skipped = summary.skipped,
        failed = summary.failed,
        cancelled = summary.cancelled,
        rows = summary.rows_written,
        "optimization run finished"
    );
    Ok(summary)
}
