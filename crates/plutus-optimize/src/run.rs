//! Optimization run definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for an optimization run.
pub type RunId = Uuid;

/// Status of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created but not yet started.
    #[default]
    Pending,
    /// Converting files.
    Running,
    /// Every file was processed.
    Completed,
    /// The run stopped on an error outside any single file.
    Failed,
    /// The run was cancelled before every file was processed.
    Cancelled,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of one file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Waiting for a worker.
    #[default]
    Pending,
    /// Being converted.
    Running,
    /// A new optimized file was written.
    Converted,
    /// The optimized file was already current.
    Unchanged,
    /// The conversion failed.
    Failed,
    /// Not attempted because the run was cancelled.
    Cancelled,
}

impl FileStatus {
    /// Returns true if the file will not be touched again in this run.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Converted => "converted",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One raw file to convert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    /// Ticker the file belongs to.
    pub ticker: String,
    /// Raw source file.
    pub source: PathBuf,
    /// Optimized target file.
    pub target: PathBuf,
    /// Current status.
    pub status: FileStatus,
    /// Rows written to the target.
    pub rows_written: u64,
    /// Malformed rows skipped while reading the source.
    pub rows_skipped: u64,
    /// Error message if the conversion failed.
    pub error_message: Option<String>,
}

impl FileTask {
    /// Creates a pending task.
    #[must_use]
    pub const fn new(ticker: String, source: PathBuf, target: PathBuf) -> Self {
        Self {
            ticker,
            source,
            target,
            status: FileStatus::Pending,
            rows_written: 0,
            rows_skipped: 0,
            error_message: None,
        }
    }
}

/// A complete optimization run over a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRun {
    /// Unique identifier for this run.
    pub id: RunId,
    /// Dataset root being optimized.
    pub root: PathBuf,
    /// Timestamp when the run was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the run started converting.
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp when the run finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status of the run.
    pub status: RunStatus,
    /// Files of the run.
    pub tasks: Vec<FileTask>,
    /// Number of concurrent conversions.
    pub concurrency: usize,
}

impl OptimizeRun {
    /// Creates a run with no tasks yet.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            root,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: RunStatus::Pending,
            tasks: Vec::new(),
            concurrency: 0,
        }
    }

    /// Returns the number of tasks in `status`.
    #[must_use]
    pub fn count(&self, status: FileStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Returns the number of finished tasks.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.tasks.iter().filter(|t| t.status.is_finished()).count()
    }

    /// Returns the overall progress percentage.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        (self.finished() as f64 / self.tasks.len() as f64) * 100.0
    }

    /// Returns true if the run is in a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Marks the run as started with its task list.
    pub fn mark_started(&mut self, tasks: Vec<FileTask>, concurrency: usize) {
        self.tasks = tasks;
        self.concurrency = concurrency;
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Marks the run as completed.
    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run as failed.
    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run as cancelled, cancelling every unfinished task.
    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());

        for task in &mut self.tasks {
            if !task.status.is_finished() {
                task.status = FileStatus::Cancelled;
            }
        }
    }
}
