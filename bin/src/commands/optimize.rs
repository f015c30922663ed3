//! Optimize command implementation.
//!
//! This module converts every raw file of the dataset into its optimized
//! counterpart, showing progress and stopping between files on Ctrl-C.

use anyhow::{Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use plutus_lib::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// How often the progress bar polls the run state.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Optimize all raw files under `root`.
pub(crate) async fn optimize(
    root: DatasetRoot,
    concurrency: Option<usize>,
    row_group_size: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut options = OptimizeOptions::default();
    if let Some(n) = concurrency {
        options = options.with_concurrency(n);
    }
    if let Some(rows) = row_group_size {
        options = options.with_row_group_size(rows);
    }

    let cancel = CancelFlag::new();
    let progress = Arc::new(OptimizeProgress::with_save_interval(
        &root,
        options.checkpoint_interval,
    ));

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling after files in progress finish...");
                cancel.cancel();
            }
        })
    };

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                .expect("Invalid progress template")
                .progress_chars("=>-"),
        );
        pb.set_message(root.to_string());
        pb
    };

    let poller = {
        let progress = Arc::clone(&progress);
        let bar = bar.clone();
        tokio::spawn(async move {
            loop {
                bar.set_length(progress.total_files().await as u64);
                bar.set_position(progress.finished_files().await as u64);
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
    };

    let result = optimize_dataset(&root, options, cancel, Arc::clone(&progress)).await;
    poller.abort();
    ctrl_c.abort();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            bar.abandon_with_message("failed");
            return Err(e.into());
        }
    };

    bar.set_length(summary.total() as u64);
    bar.set_position((summary.total() - summary.cancelled) as u64);
    bar.finish_with_message(format!(
        "{} converted, {} skipped, {} failed",
        summary.converted, summary.skipped, summary.failed
    ));

    println!("Run:       {}", summary.run_id);
    println!("Converted: {}", summary.converted);
    println!("Skipped:   {}", summary.skipped);
    println!("Failed:    {}", summary.failed);
    if summary.cancelled > 0 {
        println!("Cancelled: {}", summary.cancelled);
    }
    println!("Rows:      {}", summary.rows_written);

    for (path, message) in &summary.failures {
        eprintln!("  {}: {message}", path.display());
    }

    if summary.failed > 0 {
        bail!("{} file(s) failed to optimize", summary.failed);
    }
    if summary.cancelled > 0 {
        bail!("Optimization cancelled");
    }
    Ok(())
}
