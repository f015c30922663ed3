//! Progress tracking for optimization runs.
//!
//! Shared run state updated by concurrent workers, with periodic checkpoints
//! of the run report to disk.

use crate::{FileStatus, FileTask, OptimizeRun, RunId};
use parking_lot::Mutex;
use plutus_types::{DatasetRoot, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::warn;

/// Thread-safe progress tracker for an optimization run.
#[derive(Debug)]
pub struct OptimizeProgress {
    /// Directory holding run checkpoints.
    runs_dir: PathBuf,
    /// The run being tracked.
    run: Arc<RwLock<OptimizeRun>>,
    /// Minimum interval between periodic saves.
    save_interval: Duration,
    /// Last time state was saved to disk.
    last_save: Mutex<Instant>,
}

impl OptimizeProgress {
    /// Default save interval for checkpointing (10 seconds).
    pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

    /// Creates a tracker for a new run over `root`.
    #[must_use]
    pub fn new(root: &DatasetRoot) -> Self {
        Self::with_save_interval(root, Self::DEFAULT_SAVE_INTERVAL)
    }

    /// Creates a tracker with a custom save interval.
    #[must_use]
    pub fn with_save_interval(root: &DatasetRoot, save_interval: Duration) -> Self {
        Self {
            runs_dir: root.runs_dir(),
            run: Arc::new(RwLock::new(OptimizeRun::new(root.path().to_path_buf()))),
            save_interval,
            last_save: Mutex::new(Instant::now()),
        }
    }

    /// Returns the run identifier.
    pub async fn id(&self) -> RunId {
        self.run.read().await.id
    }

    /// Returns the checkpoint path of the run.
    pub async fn checkpoint_path(&self) -> PathBuf {
        checkpoint_path(&self.runs_dir, self.id().await)
    }

    /// Registers the files of the run and marks it started.
    pub async fn start(&self, tasks: Vec<FileTask>, concurrency: usize) {
        self.run.write().await.mark_started(tasks, concurrency);
        self.save_or_warn().await;
    }

    /// Marks a file as being converted.
    pub async fn mark_file_running(&self, idx: usize) {
        self.update(idx, |task| task.status = FileStatus::Running)
            .await;
        self.maybe_save_checkpoint().await;
    }

    /// Records the outcome of a finished file.
    pub async fn mark_file_finished(
        &self,
        idx: usize,
        status: FileStatus,
        rows: u64,
        skipped: u64,
    ) {
        self.update(idx, |task| {
            task.status = status;
            task.rows_written = rows;
            task.rows_skipped = skipped;
        })
        .await;
        self.maybe_save_checkpoint().await;
    }

    /// Marks a file as failed.
    pub async fn mark_file_failed(&self, idx: usize, error: &str) {
        self.update(idx, |task| {
            task.status = FileStatus::Failed;
            task.error_message = Some(error.to_string());
        })
        .await;
        // Always save on failure
        self.save_or_warn().await;
    }

    /// Marks a file as not attempted.
    pub async fn mark_file_cancelled(&self, idx: usize) {
        self.update(idx, |task| task.status = FileStatus::Cancelled)
            .await;
    }

    /// Marks the run as completed.
    pub async fn mark_run_completed(&self) {
        self.run.write().await.mark_completed();
        self.save_or_warn().await;
    }

    /// Marks the run as cancelled.
    pub async fn mark_run_cancelled(&self) {
        self.run.write().await.mark_cancelled();
        self.save_or_warn().await;
    }

    /// Marks the run as failed.
    pub async fn mark_run_failed(&self) {
        self.run.write().await.mark_failed();
        self.save_or_warn().await;
    }

    /// Saves the run report to disk regardless of the save interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub async fn save_checkpoint(&self) -> Result<()> {
        let json = {
            let run = self.run.read().await;
            serde_json::to_vec_pretty(&*run)?
        };
        let path = self.checkpoint_path().await;
        std::fs::create_dir_all(&self.runs_dir)?;
        let mut tmp = NamedTempFile::new_in(&self.runs_dir)?;
        tmp.write_all(&json)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        *self.last_save.lock() = Instant::now();
        Ok(())
    }

    /// Returns a copy of the current run state.
    pub async fn run(&self) -> OptimizeRun {
        self.run.read().await.clone()
    }

    /// Returns the number of finished files.
    pub async fn finished_files(&self) -> usize {
        self.run.read().await.finished()
    }

    /// Returns the total number of files.
    pub async fn total_files(&self) -> usize {
        self.run.read().await.tasks.len()
    }

    /// Returns the number of failed files.
    pub async fn failed_files(&self) -> usize {
        self.run.read().await.count(FileStatus::Failed)
    }

    /// Returns the current progress percentage.
    pub async fn progress_percent(&self) -> f64 {
        self.run.read().await.progress_percent()
    }

    async fn update(&self, idx: usize, f: impl FnOnce(&mut FileTask)) {
        let mut run = self.run.write().await;
        if let Some(task) = run.tasks.get_mut(idx) {
            f(task);
        }
    }

    async fn maybe_save_checkpoint(&self) {
        let should_save = self.last_save.lock().elapsed() >= self.save_interval;
        if should_save {
            self.save_or_warn().await;
        }
    }

    async fn save_or_warn(&self) {
        if let Err(e) = self.save_checkpoint().await {
            warn!(dir = %self.runs_dir.display(), error = %e, "cannot save run checkpoint");
        }
    }
}

/// Path of the checkpoint of run `id` under `runs_dir`.
#[must_use]
pub fn checkpoint_path(runs_dir: &Path, id: RunId) -> PathBuf {
    runs_dir.join(format!("{id}.json"))
}

/// Loads a run checkpoint.
///
/// # Errors
///
/// Returns an error if the checkpoint cannot be read or parsed.
pub fn load_run(root: &DatasetRoot, id: RunId) -> Result<OptimizeRun> {
    let content = std::fs::read_to_string(checkpoint_path(&root.runs_dir(), id))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunStatus;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, DatasetRoot) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("FPT")).unwrap();
        let root = DatasetRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    fn tasks(n: usize) -> Vec<FileTask> {
        (0..n)
            .map(|i| {
                FileTask::new(
                    "FPT".to_string(),
                    PathBuf::from(format!("/data/FPT/2021-01-0{i}.csv")),
                    PathBuf::from(format!("/data/FPT/2021-01-0{i}.parquet")),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_writes_checkpoint() {
        let (_dir, root) = fixture();
        let progress = OptimizeProgress::new(&root);
        progress.start(tasks(2), 2).await;

        let saved = load_run(&root, progress.id().await).unwrap();
        assert_eq!(saved.status, RunStatus::Running);
        assert_eq!(saved.tasks.len(), 2);
        assert_eq!(saved.concurrency, 2);
    }

    #[tokio::test]
    async fn test_file_outcomes() {
        let (_dir, root) = fixture();
        let progress = OptimizeProgress::with_save_interval(&root, Duration::ZERO);
        progress.start(tasks(3), 1).await;

        progress.mark_file_running(0).await;
        progress
            .mark_file_finished(0, FileStatus::Converted, 10, 1)
            .await;
        progress.mark_file_failed(1, "boom").await;
        assert_eq!(progress.finished_files().await, 2);
        assert_eq!(progress.failed_files().await, 1);
        assert_eq!(progress.total_files().await, 3);

        let saved = load_run(&root, progress.id().await).unwrap();
        assert_eq!(saved.tasks[0].rows_written, 10);
        assert_eq!(saved.tasks[1].error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_cancel_run() {
        let (_dir, root) = fixture();
        let progress = OptimizeProgress::new(&root);
        progress.start(tasks(2), 1).await;
        progress
            .mark_file_finished(0, FileStatus::Unchanged, 0, 0)
            .await;
        progress.mark_run_cancelled().await;

        let run = progress.run().await;
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.tasks[1].status, FileStatus::Cancelled);
        assert!((progress.progress_percent().await - 100.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_ignored() {
        let (_dir, root) = fixture();
        let progress = OptimizeProgress::new(&root);
        progress.start(tasks(1), 1).await;
        progress.mark_file_failed(5, "missing").await;
        assert_eq!(progress.failed_files().await, 0);
    }
}
