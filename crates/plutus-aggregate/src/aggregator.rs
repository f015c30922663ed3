//! Streaming tick-to-bar and bar-to-bar aggregation.

use chrono::NaiveDateTime;
use plutus_types::{Interval, PlutusError, Result, SessionPolicy, Tick, Ticker};
use tracing::{debug, trace};

use crate::{Bar, IntervalBucketer};

/// Streaming tick aggregator.
///
/// Folds an ordered tick stream into bars. A tick in the open bucket updates
/// it, a tick in a later bucket closes it, and a tick in an earlier bucket is
/// an ordering error. Buckets without ticks produce no bars.
#[derive(Debug)]
pub struct OhlcAggregator {
    ticker: Ticker,
    interval: Interval,
    bucketer: IntervalBucketer,
    current_bar: Option<BarBuilder>,
}

impl OhlcAggregator {
    /// Creates a new aggregator for one ticker and interval.
    #[must_use]
    pub const fn new(ticker: Ticker, interval: Interval, policy: SessionPolicy) -> Self {
        Self {
            ticker,
            interval,
            bucketer: IntervalBucketer::new(policy),
            current_bar: None,
        }
    }

    /// Returns the interval being aggregated to.
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Returns the start of the open bucket, if any.
    #[must_use]
    pub fn open_bucket(&self) -> Option<NaiveDateTime> {
        self.current_bar.as_ref().map(|b| b.bar_time)
    }

    /// Processes a tick, potentially emitting a completed bar.
    ///
    /// # Errors
    ///
    /// Returns [`PlutusError::Ordering`] if the tick falls in a bucket earlier
    /// than the open one. The aggregator state is left unchanged.
    pub fn push(&mut self, tick: &Tick) -> Result<Option<Bar>> {
        let bucket = self.bucketer.bucket_key(tick.timestamp, self.interval);

        match self.current_bar.as_mut() {
            Some(builder) if builder.bar_time == bucket => {
                let price = tick.matched_price;
                builder.update(price, price, price, tick.matched_volume, 1);
                Ok(None)
            }
            Some(builder) if bucket < builder.bar_time => {
                debug!(
                    ticker = %self.ticker,
                    timestamp = %tick.timestamp,
                    open_bucket = %builder.bar_time,
                    "tick behind open bucket"
                );
                Err(PlutusError::Ordering {
                    ticker: self.ticker.clone(),
                    bucket,
                    open_bucket: builder.bar_time,
                })
            }
            _ => {
                let next = BarBuilder::from_tick(bucket, tick);
                Ok(self
                    .current_bar
                    .replace(next)
                    .map(|b| b.finish(&self.ticker, self.interval)))
            }
        }
    }

    /// Finishes aggregation, returning any remaining partial bar.
    #[must_use]
    pub fn finish(self) -> Option<Bar> {
        self.current_bar.map(|b| b.finish(&self.ticker, self.interval))
    }
}

/// Re-buckets finished bars into a coarser interval.
///
/// Produces the same bars as aggregating the underlying ticks directly at the
/// target interval, provided the source interval nests within it.
#[derive(Debug)]
pub struct BarAggregator {
    target: Interval,
    bucketer: IntervalBucketer,
    ticker: Option<Ticker>,
    current_bar: Option<BarBuilder>,
}

impl BarAggregator {
    /// Creates a new re-bucketing aggregator.
    #[must_use]
    pub const fn new(target: Interval, policy: SessionPolicy) -> Self {
        Self {
            target,
            bucketer: IntervalBucketer::new(policy),
            ticker: None,
            current_bar: None,
        }
    }

    /// Processes a finer bar, potentially emitting a completed coarser bar.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the bar's interval does not nest within
    /// the target, or an ordering error if bars arrive out of order.
    pub fn push(&mut self, bar: &Bar) -> Result<Option<Bar>> {
        if !bar.interval.nests_within(self.target, self.bucketer.policy()) {
            return Err(PlutusError::validation(format!(
                "{} bars do not nest within {} buckets",
                bar.interval, self.target
            )));
        }
        let bucket = self.bucketer.bucket_key(bar.bar_time, self.target);
        let ticker = self.ticker.get_or_insert_with(|| bar.ticker.clone());

        match self.current_bar.as_mut() {
            Some(builder) if builder.bar_time == bucket => {
                builder.update(bar.high, bar.low, bar.close, bar.volume, bar.tick_count);
                Ok(None)
            }
            Some(builder) if bucket < builder.bar_time => {
                debug!(
                    ticker = %ticker,
                    bar_time = %bar.bar_time,
                    open_bucket = %builder.bar_time,
                    "bar behind open bucket"
                );
                Err(PlutusError::Ordering {
                    ticker: ticker.clone(),
                    bucket,
                    open_bucket: builder.bar_time,
                })
            }
            _ => {
                let next = BarBuilder::from_bar(bucket, bar);
                let target = self.target;
                Ok(self
                    .current_bar
                    .replace(next)
                    .map(|b| b.finish(ticker, target)))
            }
        }
    }

    /// Finishes aggregation, returning any remaining partial bar.
    #[must_use]
    pub fn finish(self) -> Option<Bar> {
        let ticker = self.ticker?;
        self.current_bar.map(|b| b.finish(&ticker, self.target))
    }
}

/// Builder for bars.
#[derive(Debug)]
struct BarBuilder {
    bar_time: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    tick_count: u64,
}

impl BarBuilder {
    /// Creates a new builder from the first tick.
    const fn from_tick(bar_time: NaiveDateTime, tick: &Tick) -> Self {
        let price = tick.matched_price;
        Self {
            bar_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: tick.matched_volume,
            tick_count: 1,
        }
    }

    /// Creates a new builder from the first finer bar.
    const fn from_bar(bar_time: NaiveDateTime, bar: &Bar) -> Self {
        Self {
            bar_time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            tick_count: bar.tick_count,
        }
    }

    /// Folds a later observation into the bar.
    fn update(&mut self, high: f64, low: f64, close: f64, volume: u64, ticks: u64) {
        self.high = self.high.max(high);
        self.low = self.low.min(low);
        self.close = close;
        self.volume = self.volume.saturating_add(volume);
        self.tick_count += ticks;
    }

    /// Finishes building and returns the bar.
    fn finish(self, ticker: &Ticker, interval: Interval) -> Bar {
        trace!(
            %ticker,
            %interval,
            bar_time = %self.bar_time,
            ticks = self.tick_count,
            "bar closed"
        );
        Bar {
            ticker: ticker.clone(),
            bar_time: self.bar_time,
            interval,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            tick_count: self.tick_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveTime, TimeDelta};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn make_tick(h: u32, m: u32, s: u32, price: f64, volume: u64) -> Tick {
        Tick::new(Ticker::new("FPT"), at(h, m, s), price, volume)
    }

    fn aggregate(ticks: &[Tick], interval: Interval) -> Vec<Bar> {
        let mut agg = OhlcAggregator::new(Ticker::new("FPT"), interval, SessionPolicy::Midnight);
        let mut bars: Vec<Bar> = ticks
            .iter()
            .filter_map(|t| agg.push(t).unwrap())
            .collect();
        bars.extend(agg.finish());
        bars
    }

    #[test]
    fn test_minute_aggregation() {
        let ticks = [
            make_tick(9, 0, 5, 10.0, 100),
            make_tick(9, 0, 40, 10.2, 50),
            make_tick(9, 1, 10, 10.1, 80),
        ];
        let bars = aggregate(&ticks, Interval::Minute1);
        assert_eq!(bars.len(), 2);

        let first = &bars[0];
        assert_eq!(first.bar_time, at(9, 0, 0));
        assert_relative_eq!(first.open, 10.0);
        assert_relative_eq!(first.high, 10.2);
        assert_relative_eq!(first.low, 10.0);
        assert_relative_eq!(first.close, 10.2);
        assert_eq!(first.volume, 150);
        assert_eq!(first.tick_count, 2);

        let second = &bars[1];
        assert_eq!(second.bar_time, at(9, 1, 0));
        assert_relative_eq!(second.open, 10.1);
        assert_relative_eq!(second.close, 10.1);
        assert_eq!(second.volume, 80);
        assert_eq!(second.tick_count, 1);
    }

    #[test]
    fn test_gap_produces_no_empty_bars() {
        let ticks = [make_tick(9, 0, 0, 10.0, 1), make_tick(9, 5, 0, 10.5, 1)];
        let bars = aggregate(&ticks, Interval::Minute1);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].bar_time, at(9, 5, 0));
    }

    #[test]
    fn test_out_of_order_bucket_is_error() {
        let mut agg =
            OhlcAggregator::new(Ticker::new("FPT"), Interval::Minute1, SessionPolicy::Midnight);
        assert!(agg.push(&make_tick(9, 2, 0, 10.0, 1)).unwrap().is_none());
        let err = agg.push(&make_tick(9, 1, 59, 10.0, 1)).unwrap_err();
        assert!(matches!(err, PlutusError::Ordering { .. }));
        assert_eq!(agg.open_bucket(), Some(at(9, 2, 0)));
    }

    #[test]
    fn test_out_of_order_within_bucket_is_folded() {
        let ticks = [make_tick(9, 0, 40, 10.2, 1), make_tick(9, 0, 5, 10.0, 1)];
        let bars = aggregate(&ticks, Interval::Minute1);
        assert_eq!(bars.len(), 1);
        assert_relative_eq!(bars[0].open, 10.2);
        assert_relative_eq!(bars[0].close, 10.0);
    }

    #[test]
    fn test_finish_empty() {
        let agg =
            OhlcAggregator::new(Ticker::new("FPT"), Interval::Hour1, SessionPolicy::Midnight);
        assert!(agg.finish().is_none());
    }

    #[test]
    fn test_rebucketing_matches_direct_aggregation() {
        let mut ticks = Vec::new();
        let start = at(9, 0, 0);
        for i in 0..500u32 {
            let ts = start + TimeDelta::seconds(i64::from(i) * 37);
            let price = 10.0 + f64::from(i % 17) * 0.05 - f64::from(i % 5) * 0.02;
            ticks.push(Tick::new(Ticker::new("FPT"), ts, price, u64::from(i % 9) + 1));
        }

        for (fine, coarse) in [
            (Interval::Minute1, Interval::Minute5),
            (Interval::Minute5, Interval::Hour1),
            (Interval::Minute15, Interval::Hour4),
            (Interval::Hour1, Interval::Day1),
        ] {
            let direct = aggregate(&ticks, coarse);
            let mut rebucket = BarAggregator::new(coarse, SessionPolicy::Midnight);
            let mut rebucketed: Vec<Bar> = aggregate(&ticks, fine)
                .iter()
                .filter_map(|b| rebucket.push(b).unwrap())
                .collect();
            rebucketed.extend(rebucket.finish());
            assert_eq!(rebucketed, direct, "{fine} -> {coarse}");
        }
    }

    #[test]
    fn test_rebucketing_rejects_non_nesting() {
        let bars = aggregate(&[make_tick(9, 0, 0, 10.0, 1)], Interval::Hour1);
        let anchor = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        let mut rebucket = BarAggregator::new(Interval::Day1, SessionPolicy::AnchoredAt(anchor));
        assert!(matches!(
            rebucket.push(&bars[0]),
            Err(PlutusError::Validation(_))
        ));
    }
}
