//! Tick data representation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// An exchange ticker symbol, normalized to uppercase.
///
/// Cheap to clone: every tick of a file shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(Arc<str>);

impl Ticker {
    /// Creates a ticker, trimming whitespace and uppercasing.
    #[must_use]
    pub fn new(symbol: &str) -> Self {
        Self(Arc::from(symbol.trim().to_uppercase()))
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `symbol` names this ticker (case-insensitive).
    #[must_use]
    pub fn matches(&self, symbol: &str) -> bool {
        self.0.eq_ignore_ascii_case(symbol.trim())
    }

    /// Returns true if the symbol is a plausible ticker: non-empty ASCII alphanumerics.
    #[must_use]
    pub fn is_valid_symbol(symbol: &str) -> bool {
        !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ticker {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

/// Aggressor side of a matched trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    /// Buyer-initiated (active buy).
    Buy,
    /// Seller-initiated (active sell).
    Sell,
}

impl TradeSide {
    /// Returns the single-letter code used in raw files.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Buy => "B",
            Self::Sell => "S",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "b" | "buy" => Ok(Self::Buy),
            "s" | "sell" => Ok(Self::Sell),
            other => Err(format!("invalid side '{other}', expected B or S")),
        }
    }
}

/// A single matched trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Ticker symbol.
    pub ticker: Ticker,
    /// Exchange-local timestamp of the match.
    pub timestamp: NaiveDateTime,
    /// Matched price.
    pub matched_price: f64,
    /// Matched volume.
    pub matched_volume: u64,
    /// Aggressor side, when the source records it.
    pub side: Option<TradeSide>,
    /// Running matched volume for the trading day, when the source records it.
    pub cumulative_volume: Option<u64>,
}

impl Tick {
    /// Creates a new tick without extra fields.
    #[must_use]
    pub const fn new(
        ticker: Ticker,
        timestamp: NaiveDateTime,
        matched_price: f64,
        matched_volume: u64,
    ) -> Self {
        Self {
            ticker,
            timestamp,
            matched_price,
            matched_volume,
            side: None,
            cumulative_volume: None,
        }
    }

    /// Sets the aggressor side.
    #[must_use]
    pub const fn with_side(mut self, side: Option<TradeSide>) -> Self {
        self.side = side;
        self
    }

    /// Sets the cumulative daily volume.
    #[must_use]
    pub const fn with_cumulative_volume(mut self, volume: Option<u64>) -> Self {
        self.cumulative_volume = volume;
        self
    }
}
