//! Aligned bucket assignment.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use plutus_types::{Interval, SessionPolicy};

/// Maps timestamps to the start of their interval bucket.
///
/// Buckets are left-closed: a tick exactly on a boundary opens the new bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalBucketer {
    policy: SessionPolicy,
}

impl IntervalBucketer {
    /// Creates a bucketer with the given session alignment.
    #[must_use]
    pub const fn new(policy: SessionPolicy) -> Self {
        Self { policy }
    }

    /// Returns the session alignment.
    #[must_use]
    pub const fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Returns the start of the bucket containing `timestamp`.
    ///
    /// Daily buckets are the calendar date at midnight. Intraday buckets are
    /// multiples of the interval measured from the session anchor.
    #[must_use]
    pub fn bucket_key(&self, timestamp: NaiveDateTime, interval: Interval) -> NaiveDateTime {
        if interval.is_daily() {
            return truncate_to_day(timestamp);
        }
        let len = interval.seconds();
        truncate_from(timestamp, self.policy.anchor_seconds() % len, len)
    }
}

/// Truncates to local midnight.
fn truncate_to_day(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::MIN)
}

/// Truncates to `midnight + offset + k * len` for the largest such value not after `ts`.
fn truncate_from(ts: NaiveDateTime, offset: i64, len: i64) -> NaiveDateTime {
    let secs = i64::from(ts.time().num_seconds_from_midnight());
    let k = (secs - offset).div_euclid(len);
    truncate_to_day(ts) + TimeDelta::seconds(offset + k * len)
}
