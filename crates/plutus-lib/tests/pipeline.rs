//! End-to-end tests over a temporary dataset.

use approx::assert_relative_eq;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use plutus_lib::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

fn dt(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, d)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn day_range(from: u32, to: u32) -> TimeRange {
    TimeRange::new(dt(from, 0, 0, 0), dt(to, 0, 0, 0)).unwrap()
}

/// Deterministic trading day: one tick every 7 seconds from 09:00 to 14:45.
fn session(day: u32) -> String {
    let mut body = String::from("datetime,tickersymbol,price,quantity,side,total\n");
    let open = dt(day, 9, 0, 0);
    let mut total = 0u64;
    for i in 0..2957u32 {
        let ts = open + chrono::Duration::seconds(i64::from(i) * 7);
        let price = 100.0 + f64::from((i * 37 + day) % 50) / 10.0;
        let volume = u64::from(10 + (i * 13) % 90);
        total += volume;
        let side = if i % 3 == 0 { "S" } else { "B" };
        body.push_str(&format!(
            "{},FPT,{price:.1},{volume},{side},{total}\n",
            ts.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    body
}

fn dataset() -> (TempDir, DatasetRoot) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "FPT/2021/2021-01-04.csv", &session(4));
    write(dir.path(), "FPT/2021/2021-01-05.csv", &session(5));
    write(dir.path(), "FPT/2021/2021-01-06.csv", &session(6));
    write(
        dir.path(),
        "VIC/2021-01.csv",
        "datetime,tickersymbol,price,quantity\n2021-01-04 09:00:05,VIC,100.0,5\n",
    );
    let root = DatasetRoot::new(dir.path()).unwrap();
    (dir, root)
}

fn engine(root: &DatasetRoot, preference: FormatPreference) -> QueryEngine {
    let catalog = Arc::new(DatasetCatalog::scan(root).unwrap());
    let config = EngineConfig::new(root.clone()).with_format_preference(preference);
    QueryEngine::with_catalog(config, catalog)
}

fn bars(engine: &QueryEngine, range: TimeRange, interval: Interval) -> Vec<Bar> {
    engine
        .bars(&QuerySpec::ohlc("FPT", range, interval))
        .unwrap()
        .map(|b| b.unwrap())
        .collect()
}

fn ticks(engine: &QueryEngine, range: TimeRange) -> Vec<Tick> {
    engine
        .ticks(&QuerySpec::ticks("FPT", range))
        .unwrap()
        .map(|t| t.unwrap())
        .collect()
}

#[test]
fn test_fpt_one_minute_example() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "FPT/2021-01-04.csv",
        "datetime,tickersymbol,price,quantity\n\
         2021-01-04 09:00:05,FPT,10.0,100\n\
         2021-01-04 09:00:40,FPT,10.2,50\n\
         2021-01-04 09:01:10,FPT,10.1,80\n",
    );
    let root = DatasetRoot::new(dir.path()).unwrap();
    let out = bars(&engine(&root, FormatPreference::Auto), day_range(4, 5), Interval::Minute1);

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].bar_time, dt(4, 9, 0, 0));
    assert_relative_eq!(out[0].open, 10.0);
    assert_relative_eq!(out[0].high, 10.2);
    assert_relative_eq!(out[0].low, 10.0);
    assert_relative_eq!(out[0].close, 10.2);
    assert_eq!(out[0].volume, 150);
    assert_eq!(out[1].bar_time, dt(4, 9, 1, 0));
    assert_relative_eq!(out[1].open, 10.1);
    assert_relative_eq!(out[1].close, 10.1);
    assert_eq!(out[1].volume, 80);
}

#[test]
fn test_range_without_files_is_empty() {
    let (_dir, root) = dataset();
    let feb = TimeRange::days(
        NaiveDate::from_ymd_opt(2021, 2, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 2, 2).unwrap(),
    )
    .unwrap();
    let engine = engine(&root, FormatPreference::Auto);
    assert!(bars(&engine, feb, Interval::Minute5).is_empty());
    assert!(ticks(&engine, feb).is_empty());
}

#[test]
fn test_unknown_ticker_not_found() {
    let (_dir, root) = dataset();
    let err = engine(&root, FormatPreference::Auto)
        .query(&QuerySpec::ticks("ZZZZ", day_range(4, 5)))
        .unwrap_err();
    assert!(matches!(err, PlutusError::NotFound { ref ticker } if ticker == "ZZZZ"));
}

#[test]
fn test_adjacent_ranges_concatenate() {
    let (_dir, root) = dataset();
    let engine = engine(&root, FormatPreference::Auto);
    let split = dt(5, 11, 17, 3);

    let mut joined = ticks(&engine, TimeRange::new(dt(4, 0, 0, 0), split).unwrap());
    joined.extend(ticks(&engine, TimeRange::new(split, dt(7, 0, 0, 0)).unwrap()));
    let whole = ticks(&engine, day_range(4, 7));

    assert_eq!(whole.len(), 3 * 2957);
    assert_eq!(joined, whole);
}

#[test]
fn test_bar_invariants() {
    let (_dir, root) = dataset();
    let engine = engine(&root, FormatPreference::Auto);
    let range = day_range(4, 7);
    let out = bars(&engine, range, Interval::Minute15);

    assert!(out.iter().all(Bar::is_consistent));
    assert!(out.windows(2).all(|w| w[0].bar_time < w[1].bar_time));

    let tick_volume: u64 = ticks(&engine, range).iter().map(|t| t.matched_volume).sum();
    let bar_volume: u64 = out.iter().map(|b| b.volume).sum();
    assert_eq!(bar_volume, tick_volume);
}

#[test]
fn test_rebucketing_matches_direct_aggregation() {
    let (_dir, root) = dataset();
    let engine = engine(&root, FormatPreference::Auto);
    let range = day_range(4, 7);

    for (fine, coarse) in [
        (Interval::Minute1, Interval::Minute5),
        (Interval::Minute5, Interval::Minute30),
        (Interval::Minute15, Interval::Hour1),
        (Interval::Hour1, Interval::Hour4),
        (Interval::Minute30, Interval::Day1),
    ] {
        let mut aggregator = BarAggregator::new(coarse, SessionPolicy::Midnight);
        let mut rebucketed = Vec::new();
        for bar in bars(&engine, range, fine) {
            rebucketed.extend(aggregator.push(&bar).unwrap());
        }
        rebucketed.extend(aggregator.finish());

        let direct = bars(&engine, range, coarse);
        assert_eq!(rebucketed.len(), direct.len(), "{fine} -> {coarse}");
        for (a, b) in rebucketed.iter().zip(&direct) {
            assert_eq!(a.bar_time, b.bar_time);
            assert_relative_eq!(a.open, b.open);
            assert_relative_eq!(a.high, b.high);
            assert_relative_eq!(a.low, b.low);
            assert_relative_eq!(a.close, b.close);
            assert_eq!(a.volume, b.volume);
            assert_eq!(a.tick_count, b.tick_count);
        }
    }
}

#[test]
fn test_anchored_session_buckets() {
    let (_dir, root) = dataset();
    let anchor = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
    let catalog = Arc::new(DatasetCatalog::scan(&root).unwrap());
    let config = EngineConfig::new(root).with_session_policy(SessionPolicy::AnchoredAt(anchor));
    let engine = QueryEngine::with_catalog(config, catalog);

    let out = bars(&engine, day_range(4, 5), Interval::Hour1);
    assert_eq!(out[0].bar_time, dt(4, 8, 15, 0));
    assert_eq!(out[1].bar_time, dt(4, 9, 15, 0));
    assert!(out.iter().all(|b| b.bar_time.time().format("%M").to_string() == "15"));
}

#[tokio::test]
async fn test_optimized_path_matches_raw_path() {
    let (_dir, root) = dataset();
    let range = day_range(4, 7);
    let raw_bars = bars(&engine(&root, FormatPreference::Raw), range, Interval::Minute5);
    let raw_ticks = ticks(&engine(&root, FormatPreference::Raw), range);

    let options = OptimizeOptions::default()
        .with_concurrency(2)
        .with_row_group_size(1000);
    let first = optimize_dataset(
        &root,
        options.clone(),
        CancelFlag::new(),
        Arc::new(OptimizeProgress::new(&root)),
    )
    .await
    .unwrap();
    assert_eq!(first.converted, 4);

    let second = optimize_dataset(
        &root,
        options,
        CancelFlag::new(),
        Arc::new(OptimizeProgress::new(&root)),
    )
    .await
    .unwrap();
    assert_eq!(second.converted, 0);
    assert_eq!(second.skipped, 4);

    let optimized = engine(&root, FormatPreference::Auto);
    let files = optimized
        .catalog()
        .resolve("FPT", &range, FormatPreference::Auto)
        .unwrap();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.format == StorageFormat::Optimized));

    assert_eq!(ticks(&optimized, range), raw_ticks);
    let opt_bars = bars(&optimized, range, Interval::Minute5);
    assert_eq!(opt_bars.len(), raw_bars.len());
    for (a, b) in opt_bars.iter().zip(&raw_bars) {
        assert_eq!(a.bar_time, b.bar_time);
        assert_relative_eq!(a.open, b.open);
        assert_relative_eq!(a.close, b.close);
        assert_eq!(a.volume, b.volume);
    }
}

#[tokio::test]
async fn test_stale_optimized_file_falls_back_to_raw() {
    let (dir, root) = dataset();
    optimize_dataset(
        &root,
        OptimizeOptions::default(),
        CancelFlag::new(),
        Arc::new(OptimizeProgress::new(&root)),
    )
    .await
    .unwrap();

    let mut body = session(4);
    body.push_str("2021-01-04 14:46:00,FPT,99.0,1,B,0\n");
    write(dir.path(), "FPT/2021/2021-01-04.csv", &body);

    let engine = engine(&root, FormatPreference::Auto);
    let files = engine
        .catalog()
        .resolve("FPT", &day_range(4, 5), FormatPreference::Auto)
        .unwrap();
    assert_eq!(files[0].format, StorageFormat::Raw);
    assert_eq!(ticks(&engine, day_range(4, 5)).len(), 2958);
}

#[tokio::test]
async fn test_rejected_rows_match_across_formats() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "FPT/2021-01-04.csv",
        "datetime,tickersymbol,price,quantity,side,total\n\
         2021-01-04 09:00:05,FPT,10.0,100,B,100\n\
         2021-01-04 09:00:40,FPT,10.2,50,S,150\n\
         2021-01-04 09:00:50,FPT,10.5,100,X,250\n\
         2021-01-04 09:00:55,FPT,10.6,10,B,abc\n\
         2021-01-04 25:00:00,FPT,10.7,10,B,260\n\
         2021-01-04 09:01:05,VIC,10.8,10,B,270\n\
         2021-01-04 09:01:10,FPT,abc,10,B,280\n\
         2021-01-04 09:01:15,FPT,-1.0,10,B,290\n\
         2021-01-04 09:01:20,FPT,10.9,1.5,B,300\n\
         2021-01-04 09:01:30,FPT,10.1,80,,380\n",
    );
    let root = DatasetRoot::new(dir.path()).unwrap();
    let range = day_range(4, 5);

    let raw = engine(&root, FormatPreference::Raw);
    let mut raw_query = raw.bars(&QuerySpec::ohlc("FPT", range, Interval::Minute1)).unwrap();
    let raw_bars: Vec<Bar> = raw_query.by_ref().map(|b| b.unwrap()).collect();
    let raw_stats = raw_query.close();
    let raw_ticks = ticks(&raw, range);

    let summary = optimize_dataset(
        &root,
        OptimizeOptions::default(),
        CancelFlag::new(),
        Arc::new(OptimizeProgress::new(&root)),
    )
    .await
    .unwrap();
    assert_eq!(summary.converted, 1);

    let optimized = engine(&root, FormatPreference::Optimized);
    let opt_bars = bars(&optimized, range, Interval::Minute1);
    let opt_ticks = ticks(&optimized, range);

    assert_eq!(raw_stats.rows_skipped, 7);
    assert_eq!(raw_ticks.len(), 3);
    assert_eq!(opt_ticks, raw_ticks);
    assert_eq!(opt_bars, raw_bars);

    assert_eq!(raw_bars.len(), 2);
    assert_eq!(raw_bars[0].tick_count, 2);
    assert_eq!(raw_bars[0].volume, 150);
    assert_relative_eq!(raw_bars[0].high, 10.2);
    assert_eq!(raw_bars[1].tick_count, 1);
    assert_eq!(raw_bars[1].volume, 80);
}
