//! List command implementation.
//!
//! This module handles listing the tickers of a dataset with their file counts
//! and declared coverage.

use anyhow::Result;
use plutus_lib::prelude::*;

/// List tickers with an optional search pattern.
pub(crate) fn list_tickers(root: &DatasetRoot, search: Option<&str>) -> Result<()> {
    let catalog = DatasetCatalog::scan(root)?;

    let tickers: Vec<_> = match search {
        Some(pattern) => catalog.search(pattern),
        None => catalog.tickers().collect(),
    };

    if tickers.is_empty() {
        println!("No tickers found.");
        return Ok(());
    }

    println!(
        "{:<10} {:>6} {:>6} {:>10} {:>12} {:>12}",
        "TICKER", "RAW", "OPT", "STALE", "FIRST", "LAST"
    );
    println!("{}", "-".repeat(61));

    for ticker in &tickers {
        let slots = catalog.slots(ticker.as_str())?;
        let raw = slots.iter().filter(|s| s.raw().is_some()).count();
        let optimized = slots.iter().filter(|s| s.optimized().is_some()).count();
        let stale = slots
            .iter()
            .filter(|s| s.optimized().is_some() && !s.is_fresh())
            .count();
        let first = slots.first().map(|s| s.coverage().first.to_string());
        let last = slots.last().map(|s| s.coverage().last.to_string());
        println!(
            "{:<10} {:>6} {:>6} {:>10} {:>12} {:>12}",
            ticker.as_str(),
            raw,
            optimized,
            stale,
            first.as_deref().unwrap_or("-"),
            last.as_deref().unwrap_or("-"),
        );
    }

    println!("\nTotal: {} tickers", tickers.len());
    Ok(())
}
