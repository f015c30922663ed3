//! Bar interval definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::SessionPolicy;

/// Aggregation interval for OHLC bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1-minute bars.
    #[serde(rename = "1m")]
    Minute1,
    /// 5-minute bars.
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute bars.
    #[serde(rename = "15m")]
    Minute15,
    /// 30-minute bars.
    #[serde(rename = "30m")]
    Minute30,
    /// 1-hour bars.
    #[serde(rename = "1h")]
    Hour1,
    /// 4-hour bars.
    #[serde(rename = "4h")]
    Hour4,
    /// Daily bars, keyed by trading date.
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    /// Returns the interval length in seconds.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::Minute1 => 60,
            Self::Minute5 => 300,
            Self::Minute15 => 900,
            Self::Minute30 => 1800,
            Self::Hour1 => 3600,
            Self::Hour4 => 14_400,
            Self::Day1 => 86_400,
        }
    }

    /// Returns true for the calendar-day interval.
    #[must_use]
    pub const fn is_daily(&self) -> bool {
        matches!(self, Self::Day1)
    }

    /// Returns true if `self` is an integer multiple of `finer`.
    #[must_use]
    pub const fn is_multiple_of(&self, finer: Self) -> bool {
        self.seconds() % finer.seconds() == 0
    }

    /// Returns true if every `coarser` bucket is an exact union of `self` buckets
    /// under `policy`.
    ///
    /// Intraday buckets share the anchor offset, so divisibility suffices. Daily
    /// buckets start at midnight, so the finer grid must also hit midnight.
    #[must_use]
    pub fn nests_within(&self, coarser: Self, policy: SessionPolicy) -> bool {
        if !coarser.is_multiple_of(*self) {
            return false;
        }
        if coarser.is_daily() && !self.is_daily() {
            return policy.anchor_seconds() % self.seconds() == 0;
        }
        true
    }

    /// Returns the interval as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }

    /// Returns all supported intervals, finest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Minute1,
            Self::Minute5,
            Self::Minute15,
            Self::Minute30,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
        ]
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "m1" | "minute" | "minute1" => Ok(Self::Minute1),
            "5m" | "m5" | "minute5" => Ok(Self::Minute5),
            "15m" | "m15" | "minute15" => Ok(Self::Minute15),
            "30m" | "m30" | "minute30" => Ok(Self::Minute30),
            "1h" | "h1" | "hour" | "hour1" => Ok(Self::Hour1),
            "4h" | "h4" | "hour4" => Ok(Self::Hour4),
            "1d" | "d1" | "day" | "day1" | "daily" => Ok(Self::Day1),
            _ => Err(IntervalParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid interval string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalParseError(String);

impl std::fmt::Display for IntervalParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid interval '{}', expected one of: 1m, 5m, 15m, 30m, 1h, 4h, 1d",
            self.0
        )
    }
}

impl std::error::Error for IntervalParseError {}

impl From<IntervalParseError> for crate::PlutusError {
    fn from(err: IntervalParseError) -> Self {
        Self::Validation(err.to_string())
    }
}
