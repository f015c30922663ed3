//! Read throughput of raw and optimized files through the query engine.
//!
//! Run with: `cargo bench --package plutus-bench --bench read_benchmark`

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use plutus_bench::BenchDataset;
use plutus_lib::{
    DatasetCatalog, EngineConfig, FormatPreference, Interval, QueryEngine, QuerySpec, TimeRange,
};
use std::sync::Arc;
use std::time::Duration;

const DAYS: u32 = 5;
const TICKS_PER_DAY: u64 = 20_000;

fn engine(dataset: &BenchDataset, preference: FormatPreference) -> QueryEngine {
    let catalog = Arc::new(DatasetCatalog::scan(&dataset.root).unwrap());
    let config = EngineConfig::new(dataset.root.clone())
        .with_format_preference(preference)
        .with_cache(false);
    QueryEngine::with_catalog(config, catalog)
}

fn full_range(dataset: &BenchDataset) -> TimeRange {
    TimeRange::days(dataset.first_day, dataset.end_day()).unwrap()
}

fn read_benchmark(c: &mut Criterion) {
    let dataset = BenchDataset::create("FPT", DAYS, TICKS_PER_DAY).unwrap();
    dataset.optimize().unwrap();
    let range = full_range(&dataset);

    let mut group = c.benchmark_group("read");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(15));
    group.throughput(Throughput::Elements(u64::from(DAYS) * TICKS_PER_DAY));

    for preference in [FormatPreference::Raw, FormatPreference::Optimized] {
        let engine = engine(&dataset, preference);
        group.bench_with_input(
            BenchmarkId::new("ticks", preference),
            &engine,
            |b, engine| {
                b.iter(|| {
                    let spec = QuerySpec::ticks(&dataset.symbol, range);
                    engine.ticks(&spec).unwrap().count()
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("bars_5m", preference),
            &engine,
            |b, engine| {
                b.iter(|| {
                    let spec = QuerySpec::ohlc(&dataset.symbol, range, Interval::Minute5);
                    engine.bars(&spec).unwrap().count()
                });
            },
        );
    }
    group.finish();
}

fn narrow_range_benchmark(c: &mut Criterion) {
    let dataset = BenchDataset::create("FPT", DAYS, TICKS_PER_DAY).unwrap();
    dataset.optimize().unwrap();
    let day = NaiveDate::from_ymd_opt(2021, 1, 6).unwrap();
    let range = TimeRange::new(
        day.and_hms_opt(10, 0, 0).unwrap(),
        day.and_hms_opt(11, 0, 0).unwrap(),
    )
    .unwrap();

    let mut group = c.benchmark_group("narrow_range");
    for preference in [FormatPreference::Raw, FormatPreference::Optimized] {
        let engine = engine(&dataset, preference);
        group.bench_function(BenchmarkId::from_parameter(preference), |b| {
            b.iter(|| {
                let spec = QuerySpec::ticks(&dataset.symbol, range);
                engine.ticks(&spec).unwrap().count()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, read_benchmark, narrow_range_benchmark);
criterion_main!(benches);
