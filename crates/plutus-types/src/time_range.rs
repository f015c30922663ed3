//! Half-open datetime ranges and date coverage.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::PlutusError;

/// A half-open range of exchange-local datetimes, `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start (inclusive).
    pub begin: NaiveDateTime,
    /// End (exclusive).
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Creates a new range, validating that begin < end.
    ///
    /// # Errors
    ///
    /// Returns a validation error if begin >= end.
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Result<Self, PlutusError> {
        if begin >= end {
            return Err(PlutusError::Validation(format!(
                "empty or inverted range: {begin} >= {end}"
            )));
        }
        Ok(Self { begin, end })
    }

    /// Creates a range covering whole days, `[start 00:00, end_exclusive 00:00)`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if start >= end_exclusive.
    pub fn days(start: NaiveDate, end_exclusive: NaiveDate) -> Result<Self, PlutusError> {
        Self::new(
            start.and_time(NaiveTime::MIN),
            end_exclusive.and_time(NaiveTime::MIN),
        )
    }

    /// Returns true if `ts` lies within the range.
    #[must_use]
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.begin && ts < self.end
    }

    /// Returns true if the closed interval `[min, max]` shares any instant with this range.
    #[must_use]
    pub fn overlaps_closed(&self, min: NaiveDateTime, max: NaiveDateTime) -> bool {
        min < self.end && max >= self.begin
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// The calendar span a dataset file declares to cover, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coverage {
    /// First covered date.
    pub first: NaiveDate,
    /// Last covered date.
    pub last: NaiveDate,
}

impl Coverage {
    /// Coverage of a single day.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            first: date,
            last: date,
        }
    }

    /// Coverage of a calendar month.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            first,
            last: next.pred_opt()?,
        })
    }

    /// Coverage of a calendar year.
    #[must_use]
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            first: NaiveDate::from_ymd_opt(year, 1, 1)?,
            last: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    /// Parses a file stem: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`.
    #[must_use]
    pub fn from_stem(stem: &str) -> Option<Self> {
        let parts: Vec<&str> = stem.split('-').collect();
        match parts.as_slice() {
            [y, m, d] if y.len() == 4 && m.len() == 2 && d.len() == 2 => {
                NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
                    .map(Self::day)
            }
            [y, m] if y.len() == 4 && m.len() == 2 => Self::month(y.parse().ok()?, m.parse().ok()?),
            [y] if y.len() == 4 => Self::year(y.parse().ok()?),
            _ => None,
        }
    }

    /// Returns the canonical stem for this coverage, if it is a day, month or year.
    #[must_use]
    pub fn stem(&self) -> String {
        if self.first == self.last {
            return self.first.format("%Y-%m-%d").to_string();
        }
        if Some(*self) == Self::month(self.first.year(), self.first.month()) {
            return self.first.format("%Y-%m").to_string();
        }
        if Some(*self) == Self::year(self.first.year()) {
            return self.first.format("%Y").to_string();
        }
        format!("{}_{}", self.first, self.last)
    }

    /// Returns the covered datetimes as a half-open range.
    #[must_use]
    pub fn as_range(&self) -> (NaiveDateTime, NaiveDateTime) {
        let begin = self.first.and_time(NaiveTime::MIN);
        let end = self
            .last
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |d| d.and_time(NaiveTime::MIN));
        (begin, end)
    }

    /// Returns true if any covered instant lies in `range`.
    #[must_use]
    pub fn intersects(&self, range: &TimeRange) -> bool {
        let (begin, end) = self.as_range();
        begin < range.end && end > range.begin
    }
}

impl std::fmt::Display for Coverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.first, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_time_range_invalid() {
        let t = dt(2021, 1, 4, 9, 0, 0);
        assert!(TimeRange::new(t, t).is_err());
        assert!(TimeRange::new(t, dt(2021, 1, 4, 8, 0, 0)).is_err());
    }

    #[test]
    fn test_time_range_half_open() {
        let range = TimeRange::new(dt(2021, 1, 4, 9, 0, 0), dt(2021, 1, 4, 10, 0, 0)).unwrap();
        assert!(range.contains(dt(2021, 1, 4, 9, 0, 0)));
        assert!(range.contains(dt(2021, 1, 4, 9, 59, 59)));
        assert!(!range.contains(dt(2021, 1, 4, 10, 0, 0)));
    }

    #[test]
    fn test_overlaps_closed_single_instant() {
        let range = TimeRange::new(dt(2021, 1, 4, 9, 0, 0), dt(2021, 1, 4, 10, 0, 0)).unwrap();
        let t = dt(2021, 1, 4, 9, 0, 0);
        assert!(range.overlaps_closed(t, t));
        let late = dt(2021, 1, 4, 10, 0, 0);
        assert!(!range.overlaps_closed(late, late));
    }

    #[test]
    fn test_coverage_from_stem() {
        let day = Coverage::from_stem("2021-01-04").unwrap();
        assert_eq!(day.first, day.last);

        let month = Coverage::from_stem("2021-02").unwrap();
        assert_eq!(month.last, NaiveDate::from_ymd_opt(2021, 2, 28).unwrap());

        let year = Coverage::from_stem("2020").unwrap();
        assert_eq!(year.last, NaiveDate::from_ymd_opt(2020, 12, 31).unwrap());

        assert!(Coverage::from_stem("quote_matched").is_none());
        assert!(Coverage::from_stem("2021-13").is_none());
    }

    #[test]
    fn test_coverage_stem_roundtrip() {
        for stem in ["2021-01-04", "2021-12", "2019"] {
            assert_eq!(Coverage::from_stem(stem).unwrap().stem(), stem);
        }
    }

    #[test]
    fn test_coverage_intersects() {
        let january = Coverage::month(2021, 1).unwrap();
        let feb = TimeRange::days(
            NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 2).unwrap(),
        )
        .unwrap();
        assert!(!january.intersects(&feb));

        let straddle = TimeRange::new(dt(2021, 1, 31, 14, 0, 0), dt(2021, 2, 1, 10, 0, 0)).unwrap();
        assert!(january.intersects(&straddle));
    }
}
