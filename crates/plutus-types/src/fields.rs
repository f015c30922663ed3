//! Field projections for tick and bar records.
//!
//! Field sets are fixed enumerations backed by a bit mask, so projections are
//! validated once and checked with a single AND at read time.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{PlutusError, QueryMode};

/// A column of a tick record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickField {
    /// Ticker symbol.
    Ticker,
    /// Match timestamp.
    Timestamp,
    /// Matched price.
    Price,
    /// Matched volume.
    Volume,
    /// Aggressor side.
    Side,
    /// Running daily volume.
    CumulativeVolume,
}

impl TickField {
    /// All tick fields in output order.
    pub const ALL: [Self; 6] = [
        Self::Ticker,
        Self::Timestamp,
        Self::Price,
        Self::Volume,
        Self::Side,
        Self::CumulativeVolume,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Returns the column name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Timestamp => "timestamp",
            Self::Price => "price",
            Self::Volume => "volume",
            Self::Side => "side",
            Self::CumulativeVolume => "cumulative_volume",
        }
    }
}

impl FromStr for TickField {
    type Err = PlutusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ticker" | "tickersymbol" => Ok(Self::Ticker),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "price" | "matched_price" => Ok(Self::Price),
            "volume" | "matched_volume" | "quantity" => Ok(Self::Volume),
            "side" => Ok(Self::Side),
            "cumulative_volume" | "total" => Ok(Self::CumulativeVolume),
            other => Err(PlutusError::validation(format!(
                "unsupported tick field '{other}'"
            ))),
        }
    }
}

/// A column of a bar record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    /// Ticker symbol.
    Ticker,
    /// Bucket start.
    BarTime,
    /// Bar interval.
    Interval,
    /// First price.
    Open,
    /// Highest price.
    High,
    /// Lowest price.
    Low,
    /// Last price.
    Close,
    /// Summed volume.
    Volume,
    /// Number of ticks folded.
    TickCount,
}

impl BarField {
    /// All bar fields in output order.
    pub const ALL: [Self; 9] = [
        Self::Ticker,
        Self::BarTime,
        Self::Interval,
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
        Self::TickCount,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    /// Returns the column name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::BarTime => "bar_time",
            Self::Interval => "interval",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
            Self::TickCount => "tick_count",
        }
    }
}

impl FromStr for BarField {
    type Err = PlutusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ticker" => Ok(Self::Ticker),
            "bar_time" | "time" | "timestamp" => Ok(Self::BarTime),
            "interval" => Ok(Self::Interval),
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" => Ok(Self::Close),
            "volume" => Ok(Self::Volume),
            "tick_count" | "count" => Ok(Self::TickCount),
            other => Err(PlutusError::validation(format!(
                "unsupported bar field '{other}'"
            ))),
        }
    }
}

/// A set of tick fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TickFields(u8);

impl TickFields {
    /// Every tick field.
    #[must_use]
    pub const fn all() -> Self {
        Self(0b11_1111)
    }

    /// The fields every tick carries.
    #[must_use]
    pub const fn core() -> Self {
        Self(
            TickField::Ticker.bit()
                | TickField::Timestamp.bit()
                | TickField::Price.bit()
                | TickField::Volume.bit(),
        )
    }

    /// Returns a copy with `field` added.
    #[must_use]
    pub const fn with(self, field: TickField) -> Self {
        Self(self.0 | field.bit())
    }

    /// Returns true if `field` is in the set.
    #[must_use]
    pub const fn contains(&self, field: TickField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if any optional field is requested.
    #[must_use]
    pub const fn needs_extras(&self) -> bool {
        self.contains(TickField::Side) || self.contains(TickField::CumulativeVolume)
    }

    /// Iterates the fields in output order.
    pub fn iter(&self) -> impl Iterator<Item = TickField> + '_ {
        TickField::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<TickField> for TickFields {
    fn from_iter<I: IntoIterator<Item = TickField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::with)
    }
}

/// A set of bar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BarFields(u16);

impl BarFields {
    /// Every bar field.
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1_1111_1111)
    }

    /// Returns a copy with `field` added.
    #[must_use]
    pub const fn with(self, field: BarField) -> Self {
        Self(self.0 | field.bit())
    }

    /// Returns true if `field` is in the set.
    #[must_use]
    pub const fn contains(&self, field: BarField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the fields in output order.
    pub fn iter(&self) -> impl Iterator<Item = BarField> + '_ {
        BarField::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<BarField> for BarFields {
    fn from_iter<I: IntoIterator<Item = BarField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), Self::with)
    }
}

/// Requested output columns of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Projection {
    /// Every field of the record kind selected by the mode.
    #[default]
    All,
    /// A subset of tick fields.
    Tick(TickFields),
    /// A subset of bar fields.
    Bar(BarFields),
}

impl Projection {
    /// Parses a comma-separated field list for `mode`; empty input means all.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown fields.
    pub fn parse(mode: QueryMode, list: &str) -> Result<Self, PlutusError> {
        let names: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Self::All);
        }
        match mode {
            QueryMode::Tick => Ok(Self::Tick(
                names
                    .into_iter()
                    .map(str::parse::<TickField>)
                    .collect::<Result<TickFields, _>>()?,
            )),
            QueryMode::Ohlc => Ok(Self::Bar(
                names
                    .into_iter()
                    .map(str::parse::<BarField>)
                    .collect::<Result<BarFields, _>>()?,
            )),
        }
    }

    /// Resolves the tick field set for a tick-mode query.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the projection names bar fields or is empty.
    pub fn tick_fields(&self) -> Result<TickFields, PlutusError> {
        match self {
            Self::All => Ok(TickFields::all()),
            Self::Tick(fields) if !fields.is_empty() => Ok(*fields),
            Self::Tick(_) => Err(PlutusError::validation("empty tick projection")),
            Self::Bar(_) => Err(PlutusError::validation(
                "bar fields requested for a tick query",
            )),
        }
    }

    /// Resolves the bar field set for an OHLC query.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the projection names tick fields or is empty.
    pub fn bar_fields(&self) -> Result<BarFields, PlutusError> {
        match self {
            Self::All => Ok(BarFields::all()),
            Self::Bar(fields) if !fields.is_empty() => Ok(*fields),
            Self::Bar(_) => Err(PlutusError::validation("empty bar projection")),
            Self::Tick(_) => Err(PlutusError::validation(
                "tick fields requested for an ohlc query",
            )),
        }
    }
}
