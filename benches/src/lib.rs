//! Benchmark fixtures for plutus.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use plutus_lib::{
    DatasetCatalog, DatasetRoot, FormatOptimizer, OptimizeOptions, Result, Tick, Ticker,
    TradeSide,
};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

/// Seconds between synthetic ticks.
const TICK_SPACING_SECS: i64 = 3;

/// Session open of synthetic trading days.
fn session_open(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(9, 0, 0).unwrap_or_default()
}

/// Deterministic price walk around 100.
fn price_at(i: u64) -> f64 {
    100.0 + ((i * 7919) % 200) as f64 / 100.0 - 1.0
}

/// Generates `count` ticks of one trading day.
#[must_use]
pub fn synthetic_ticks(symbol: &str, date: NaiveDate, count: u64) -> Vec<Tick> {
    let ticker = Ticker::new(symbol);
    let open = session_open(date);
    let mut total = 0u64;
    (0..count)
        .map(|i| {
            let volume = 10 + (i * 31) % 500;
            total += volume;
            let ts = open + TimeDelta::seconds(i as i64 * TICK_SPACING_SECS);
            let side = if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell };
            Tick::new(ticker.clone(), ts, price_at(i), volume)
                .with_side(Some(side))
                .with_cumulative_volume(Some(total))
        })
        .collect()
}

/// Renders ticks in the raw CSV layout.
#[must_use]
pub fn to_csv(ticks: &[Tick]) -> String {
    let mut body = String::from("datetime,tickersymbol,price,quantity,side,total\n");
    for tick in ticks {
        let _ = writeln!(
            body,
            "{},{},{:.2},{},{},{}",
            tick.timestamp.format("%Y-%m-%d %H:%M:%S"),
            tick.ticker,
            tick.matched_price,
            tick.matched_volume,
            tick.side.map_or("", |s| s.code()),
            tick.cumulative_volume.unwrap_or_default(),
        );
    }
    body
}

/// A temporary dataset of one ticker with one raw file per day.
#[derive(Debug)]
pub struct BenchDataset {
    /// Keeps the directory alive.
    pub dir: TempDir,
    /// Validated root.
    pub root: DatasetRoot,
    /// Ticker symbol.
    pub symbol: String,
    /// First day with data.
    pub first_day: NaiveDate,
    /// Number of days.
    pub days: u32,
}

impl BenchDataset {
    /// Writes `days` daily raw files of `ticks_per_day` ticks starting 2021-01-04.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn create(symbol: &str, days: u32, ticks_per_day: u64) -> Result<Self> {
        let dir = TempDir::new()?;
        let first_day = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap_or_default();
        let ticker_dir = dir.path().join(symbol);
        std::fs::create_dir_all(&ticker_dir)?;

        for date in first_day.iter_days().take(days as usize) {
            let ticks = synthetic_ticks(symbol, date, ticks_per_day);
            write_day(&ticker_dir, date, &to_csv(&ticks))?;
        }

        let root = DatasetRoot::new(dir.path())?;
        Ok(Self {
            dir,
            root,
            symbol: symbol.to_string(),
            first_day,
            days,
        })
    }

    /// Converts every raw file to its optimized counterpart.
    ///
    /// # Errors
    ///
    /// Returns the first conversion error.
    pub fn optimize(&self) -> Result<()> {
        let catalog = DatasetCatalog::scan(&self.root)?;
        let optimizer = FormatOptimizer::new(self.root.clone(), OptimizeOptions::default());
        for file in catalog.raw_files() {
            optimizer.optimize(file)?;
        }
        Ok(())
    }

    /// Returns the day after the last day with data.
    #[must_use]
    pub fn end_day(&self) -> NaiveDate {
        self.first_day
            .iter_days()
            .nth(self.days as usize)
            .unwrap_or(self.first_day)
    }
}

fn write_day(dir: &Path, date: NaiveDate, body: &str) -> Result<()> {
    std::fs::write(dir.join(format!("{}.csv", date.format("%Y-%m-%d"))), body)?;
    Ok(())
}
