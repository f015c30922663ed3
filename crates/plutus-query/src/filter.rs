//! Range filtering of tick streams.

use plutus_types::{Result, Tick, TimeRange};

/// Iterator adapter keeping only ticks with `begin <= timestamp < end`.
///
/// Order is preserved and errors pass through unchanged.
#[derive(Debug)]
pub struct RangeFilter<I> {
    inner: I,
    range: TimeRange,
    dropped: u64,
}

impl<I> RangeFilter<I>
where
    I: Iterator<Item = Result<Tick>>,
{
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: I, range: TimeRange) -> Self {
        Self {
            inner,
            range,
            dropped: 0,
        }
    }

    /// Returns the range being kept.
    #[must_use]
    pub const fn range(&self) -> &TimeRange {
        &self.range
    }

    /// Number of valid ticks dropped for falling outside the range.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Returns the wrapped stream.
    #[must_use]
    pub const fn get_ref(&self) -> &I {
        &self.inner
    }

    /// Unwraps the filter, returning the wrapped stream.
    #[must_use]
    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I> Iterator for RangeFilter<I>
where
    I: Iterator<Item = Result<Tick>>,
{
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(tick) if self.range.contains(tick.timestamp) => return Some(Ok(tick)),
                Ok(_) => self.dropped += 1,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Filters `stream` to `range`.
pub fn filter<I>(stream: I, range: TimeRange) -> RangeFilter<I::IntoIter>
where
    I: IntoIterator<Item = Result<Tick>>,
{
    RangeFilter::new(stream.into_iter(), range)
}
