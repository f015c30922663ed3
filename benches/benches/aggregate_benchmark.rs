//! Aggregation throughput of tick-to-bar and bar-to-bar bucketing.
//!
//! Run with: `cargo bench --package plutus-bench --bench aggregate_benchmark`

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use plutus_bench::synthetic_ticks;
use plutus_lib::{BarAggregator, Interval, OhlcAggregator, SessionPolicy, Ticker};
use std::hint::black_box;

const TICKS: u64 = 100_000;

fn ohlc_benchmark(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    let ticks = synthetic_ticks("FPT", date, TICKS);

    let mut group = c.benchmark_group("ohlc");
    group.throughput(Throughput::Elements(TICKS));

    for interval in [Interval::Minute1, Interval::Minute15, Interval::Hour1, Interval::Day1] {
        group.bench_with_input(
            BenchmarkId::from_parameter(interval),
            &interval,
            |b, &interval| {
                b.iter(|| {
                    let mut agg =
                        OhlcAggregator::new(Ticker::new("FPT"), interval, SessionPolicy::Midnight);
                    let mut bars = 0usize;
                    for tick in &ticks {
                        if agg.push(black_box(tick)).unwrap().is_some() {
                            bars += 1;
                        }
                    }
                    bars + usize::from(agg.finish().is_some())
                });
            },
        );
    }
    group.finish();
}

fn rebucket_benchmark(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    let mut agg =
        OhlcAggregator::new(Ticker::new("FPT"), Interval::Minute1, SessionPolicy::Midnight);
    let mut minute_bars = Vec::new();
    for tick in synthetic_ticks("FPT", date, TICKS) {
        minute_bars.extend(agg.push(&tick).unwrap());
    }
    minute_bars.extend(agg.finish());

    let mut group = c.benchmark_group("rebucket");
    group.throughput(Throughput::Elements(minute_bars.len() as u64));
    group.bench_function("1m_to_1h", |b| {
        b.iter(|| {
            let mut agg = BarAggregator::new(Interval::Hour1, SessionPolicy::Midnight);
            let mut out = 0usize;
            for bar in &minute_bars {
                if agg.push(black_box(bar)).unwrap().is_some() {
                    out += 1;
                }
            }
            out + usize::from(agg.finish().is_some())
        });
    });
    group.finish();
}

criterion_group!(benches, ohlc_benchmark, rebucket_benchmark);
criterion_main!(benches);
