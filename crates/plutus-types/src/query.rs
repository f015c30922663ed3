//! Query requests.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Interval, PlutusError, Projection, TimeRange};

/// Kind of records a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Raw ticks.
    Tick,
    /// OHLC bars.
    Ohlc,
}

impl QueryMode {
    /// Returns the mode as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Ohlc => "ohlc",
        }
    }
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = PlutusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tick" | "ticks" => Ok(Self::Tick),
            "ohlc" | "bar" | "bars" => Ok(Self::Ohlc),
            other => Err(PlutusError::validation(format!(
                "unsupported mode '{other}', expected tick or ohlc"
            ))),
        }
    }
}

/// A request for one ticker over a half-open time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Requested ticker symbol, matched case-insensitively.
    pub ticker: String,
    /// Time range `[begin, end)`.
    pub range: TimeRange,
    /// Record kind.
    pub mode: QueryMode,
    /// Bar interval; required for OHLC queries and forbidden otherwise.
    pub interval: Option<Interval>,
    /// Output columns.
    pub fields: Projection,
}

impl QuerySpec {
    /// A raw tick query returning all fields.
    #[must_use]
    pub fn ticks(ticker: impl Into<String>, range: TimeRange) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            mode: QueryMode::Tick,
            interval: None,
            fields: Projection::All,
        }
    }

    /// An OHLC query returning all bar fields.
    #[must_use]
    pub fn ohlc(ticker: impl Into<String>, range: TimeRange, interval: Interval) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            mode: QueryMode::Ohlc,
            interval: Some(interval),
            fields: Projection::All,
        }
    }

    /// Sets the projection.
    #[must_use]
    pub const fn with_fields(mut self, fields: Projection) -> Self {
        self.fields = fields;
        self
    }

    /// Checks the request for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty ticker, an empty or inverted
    /// range, an interval that does not match the mode, or a projection of the
    /// wrong record kind.
    pub fn validate(&self) -> Result<(), PlutusError> {
        if self.ticker.trim().is_empty() {
            return Err(PlutusError::validation("ticker must not be empty"));
        }
        if self.range.begin >= self.range.end {
            return Err(PlutusError::validation(format!(
                "empty or inverted range: {} >= {}",
                self.range.begin, self.range.end
            )));
        }
        match (self.mode, self.interval) {
            (QueryMode::Ohlc, None) => {
                return Err(PlutusError::validation("ohlc queries require an interval"));
            }
            (QueryMode::Tick, Some(interval)) => {
                return Err(PlutusError::validation(format!(
                    "tick queries do not take an interval (got {interval})"
                )));
            }
            _ => {}
        }
        match self.mode {
            QueryMode::Tick => self.fields.tick_fields().map(|_| ()),
            QueryMode::Ohlc => self.fields.bar_fields().map(|_| ()),
        }
    }
}
