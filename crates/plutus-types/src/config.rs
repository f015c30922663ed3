//! Reader and resolution policies shared by the query and optimizer crates.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do with a malformed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptAction {
    /// Skip the row, count it, and keep reading.
    #[default]
    Skip,
    /// Fail the read on the first malformed row.
    Fail,
}

/// Policy for malformed rows encountered while reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorruptPolicy {
    /// Action taken per malformed row.
    pub action: CorruptAction,
    /// Maximum fraction of skipped rows before the read fails.
    pub max_skip_ratio: f64,
    /// Rows that must be seen before the ratio is enforced.
    pub min_rows_before_ratio: u64,
}

impl Default for CorruptPolicy {
    fn default() -> Self {
        Self {
            action: CorruptAction::Skip,
            max_skip_ratio: 0.05,
            min_rows_before_ratio: 100,
        }
    }
}

impl CorruptPolicy {
    /// A policy that fails on the first malformed row.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            action: CorruptAction::Fail,
            ..Self::default()
        }
    }

    /// Sets the skip ratio threshold.
    #[must_use]
    pub const fn with_max_skip_ratio(mut self, ratio: f64) -> Self {
        self.max_skip_ratio = ratio;
        self
    }

    /// Sets the minimum number of rows seen before the ratio applies.
    #[must_use]
    pub const fn with_min_rows_before_ratio(mut self, rows: u64) -> Self {
        self.min_rows_before_ratio = rows;
        self
    }

    /// Returns true if `skipped` out of `seen` rows exceeds the threshold.
    #[must_use]
    pub fn exceeded(&self, skipped: u64, seen: u64) -> bool {
        if seen == 0 || seen < self.min_rows_before_ratio {
            return false;
        }
        skipped as f64 / seen as f64 > self.max_skip_ratio
    }
}

/// Which representation of a dataset file the catalog should hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatPreference {
    /// Optimized when fresh, otherwise raw.
    #[default]
    Auto,
    /// Always the raw file when one exists.
    Raw,
    /// Always the optimized file when one exists.
    Optimized,
}

impl FormatPreference {
    /// Returns the preference as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Raw => "raw",
            Self::Optimized => "optimized",
        }
    }
}

impl std::fmt::Display for FormatPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatPreference {
    type Err = crate::PlutusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "raw" | "csv" => Ok(Self::Raw),
            "optimized" | "parquet" => Ok(Self::Optimized),
            other => Err(crate::PlutusError::validation(format!(
                "invalid format preference '{other}', expected auto, raw or optimized"
            ))),
        }
    }
}

/// How intraday buckets are aligned within a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPolicy {
    /// Buckets are multiples of the interval measured from local midnight.
    #[default]
    Midnight,
    /// Buckets are multiples of the interval measured from a session anchor.
    AnchoredAt(NaiveTime),
}

impl SessionPolicy {
    /// Returns the anchor offset from midnight in whole seconds.
    #[must_use]
    pub fn anchor_seconds(&self) -> i64 {
        match self {
            Self::Midnight => 0,
            Self::AnchoredAt(time) => i64::from(time.num_seconds_from_midnight()),
        }
    }
}
