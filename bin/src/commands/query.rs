//! Query command implementation.
//!
//! This module runs a tick or OHLC query and streams the records to a file or
//! stdout.

use crate::display::{Format, RecordWriter};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use plutus_lib::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Arguments of the `query` command.
pub(crate) struct QueryArgs {
    pub(crate) ticker: String,
    pub(crate) begin: String,
    pub(crate) end: String,
    pub(crate) interval: Option<String>,
    pub(crate) fields: Option<String>,
    pub(crate) prefer: String,
    pub(crate) session_open: Option<String>,
    pub(crate) strict: bool,
    pub(crate) output: Option<PathBuf>,
    pub(crate) format: Format,
    pub(crate) stats: bool,
}

/// Parses `YYYY-MM-DD` as midnight or a full `YYYY-MM-DD HH:MM:SS` timestamp.
fn parse_bound(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid timestamp: {s}"))?;
    Ok(date.and_time(NaiveTime::MIN))
}

fn parse_session(open: Option<&str>) -> Result<SessionPolicy> {
    match open {
        None => Ok(SessionPolicy::Midnight),
        Some(s) => {
            let time = NaiveTime::parse_from_str(s, "%H:%M")
                .with_context(|| format!("Invalid session open: {s}"))?;
            Ok(SessionPolicy::AnchoredAt(time))
        }
    }
}

/// Builds the query request from command-line arguments.
fn build_spec(args: &QueryArgs) -> Result<QuerySpec> {
    let range = TimeRange::new(parse_bound(&args.begin)?, parse_bound(&args.end)?)?;
    let spec = match args.interval.as_deref() {
        Some(s) => {
            let interval = s.parse::<Interval>()?;
            QuerySpec::ohlc(&args.ticker, range, interval)
        }
        None => QuerySpec::ticks(&args.ticker, range),
    };
    let fields = match args.fields.as_deref() {
        Some(list) => Projection::parse(spec.mode, list)?,
        None => Projection::All,
    };
    let spec = spec.with_fields(fields);
    spec.validate()?;
    Ok(spec)
}

/// Run a query and write its records.
pub(crate) fn run_query(root: DatasetRoot, args: &QueryArgs) -> Result<()> {
    let spec = build_spec(args)?;
    let preference = args.prefer.parse::<FormatPreference>()?;
    let policy = if args.strict {
        CorruptPolicy::strict()
    } else {
        CorruptPolicy::default()
    };

    let config = EngineConfig::new(root)
        .with_format_preference(preference)
        .with_session_policy(parse_session(args.session_open.as_deref())?)
        .with_corrupt_policy(policy);
    let engine = QueryEngine::new(config)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut writer = RecordWriter::new(sink, args.format);

    let stats = match engine.query(&spec)? {
        QueryOutput::Ticks(mut ticks) => {
            let fields = spec.fields.tick_fields()?;
            writer.write_header(fields.iter().map(|f| f.as_str()))?;
            for tick in &mut ticks {
                writer.write_tick(&tick?, fields)?;
            }
            ticks.close()
        }
        QueryOutput::Bars(mut bars) => {
            let fields = spec.fields.bar_fields()?;
            writer.write_header(fields.iter().map(|f| f.as_str()))?;
            for bar in &mut bars {
                writer.write_bar(&bar?, fields)?;
            }
            bars.close()
        }
    };
    writer.finish()?;

    if let Some(path) = &args.output {
        eprintln!("Wrote {} to {}", args.format, path.display());
    }
    if args.stats {
        eprintln!("{stats}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> QueryArgs {
        QueryArgs {
            ticker: "fpt".to_string(),
            begin: "2021-01-04".to_string(),
            end: "2021-01-05 12:30:00".to_string(),
            interval: None,
            fields: None,
            prefer: "auto".to_string(),
            session_open: None,
            strict: false,
            output: None,
            format: Format::Csv,
            stats: false,
        }
    }

    #[test]
    fn test_parse_bound() {
        let midnight = parse_bound("2021-01-04").unwrap();
        assert_eq!(midnight.to_string(), "2021-01-04 00:00:00");
        let ts = parse_bound("2021-01-04T09:15:00").unwrap();
        assert_eq!(ts.to_string(), "2021-01-04 09:15:00");
        assert!(parse_bound("04/01/2021").is_err());
    }

    #[test]
    fn test_build_tick_spec() {
        let spec = build_spec(&args()).unwrap();
        assert_eq!(spec.mode, QueryMode::Tick);
        assert_eq!(spec.fields, Projection::All);
    }

    #[test]
    fn test_build_ohlc_spec_with_fields() {
        let mut a = args();
        a.interval = Some("5m".to_string());
        a.fields = Some("bar_time,close".to_string());
        let spec = build_spec(&a).unwrap();
        assert_eq!(spec.interval, Some(Interval::Minute5));
        let fields = spec.fields.bar_fields().unwrap();
        assert_eq!(fields.iter().count(), 2);
    }

    #[test]
    fn test_rejects_tick_fields_for_bars() {
        let mut a = args();
        a.interval = Some("1h".to_string());
        a.fields = Some("side".to_string());
        assert!(build_spec(&a).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut a = args();
        a.begin = "2021-01-06".to_string();
        assert!(build_spec(&a).is_err());
    }

    #[test]
    fn test_parse_session() {
        assert_eq!(parse_session(None).unwrap(), SessionPolicy::Midnight);
        assert!(matches!(
            parse_session(Some("09:00")).unwrap(),
            SessionPolicy::AnchoredAt(_)
        ));
        assert!(parse_session(Some("9am")).is_err());
    }
}
