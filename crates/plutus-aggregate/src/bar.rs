//! OHLC bar data structure.

use chrono::NaiveDateTime;
use plutus_types::{Interval, Ticker};
use serde::{Deserialize, Serialize};

/// OHLC bar (candlestick) of matched trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Ticker symbol.
    pub ticker: Ticker,
    /// Bar open time (start of the bucket).
    pub bar_time: NaiveDateTime,
    /// Bucket length.
    pub interval: Interval,
    /// First matched price in the bucket.
    pub open: f64,
    /// Highest matched price.
    pub high: f64,
    /// Lowest matched price.
    pub low: f64,
    /// Last matched price in the bucket.
    pub close: f64,
    /// Sum of matched volume.
    pub volume: u64,
    /// Number of ticks folded into the bar.
    pub tick_count: u64,
}

impl Bar {
    /// Returns true if the price envelope and tick count are consistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.tick_count >= 1
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }
}
