//! Info command implementation.
//!
//! This module handles displaying the files of a ticker, including their
//! formats, sizes and cached statistics.

use crate::display::format_bytes;
use anyhow::{Context, Result};
use plutus_lib::prelude::*;
use plutus_lib::{CoverageSlot, MetadataCache, StorageFormat};

/// Show the coverage slots of a ticker.
pub(crate) fn show_info(root: &DatasetRoot, symbol: &str) -> Result<()> {
    let catalog = DatasetCatalog::scan(root)?;
    let ticker = catalog
        .ticker(symbol)
        .with_context(|| format!("Unknown ticker: {symbol}"))?;
    let slots = catalog.slots(symbol)?;
    let cache = MetadataCache::new(root, CorruptPolicy::default());

    println!("Ticker:   {ticker}");
    println!("Root:     {root}");
    println!("Files:    {}", slots.len());

    println!(
        "\n{:<24} {:<10} {:>10} {:>10} {:<20} {:<20}",
        "COVERAGE", "FORMAT", "SIZE", "ROWS", "MIN", "MAX"
    );
    println!("{}", "-".repeat(98));

    let mut total_rows = 0u64;
    for slot in slots {
        for file in files_of(slot) {
            let entry = cache.lookup(file);
            let rows = entry.as_ref().map(|e| e.row_count).or(file.row_count);
            total_rows += rows.unwrap_or(0);
            let format = if file.format == StorageFormat::Optimized && !slot.is_fresh() {
                format!("{} (stale)", file.format)
            } else {
                file.format.to_string()
            };
            println!(
                "{:<24} {:<10} {:>10} {:>10} {:<20} {:<20}",
                slot.coverage().stem(),
                format,
                format_bytes(file.fingerprint.len),
                rows.map_or_else(|| "-".to_string(), |r| r.to_string()),
                entry
                    .as_ref()
                    .and_then(|e| e.min_timestamp)
                    .map_or_else(|| "-".to_string(), |t| t.to_string()),
                entry
                    .as_ref()
                    .and_then(|e| e.max_timestamp)
                    .map_or_else(|| "-".to_string(), |t| t.to_string()),
            );
        }
    }

    println!("\nKnown rows: {total_rows}");
    println!("Note: rows and bounds appear once a file has been fully read or optimized.");
    Ok(())
}

fn files_of(slot: &CoverageSlot) -> impl Iterator<Item = &DatasetFile> {
    slot.raw().into_iter().chain(slot.optimized())
}
