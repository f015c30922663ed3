//! Raw CSV tick files.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use plutus_types::{
    DatasetFile, PlutusError, Result, Tick, TickField, TickFields, Ticker, TradeSide,
};
use std::fs::File;
use std::path::Path;

use crate::ReadStats;
use crate::reader::{RowTally, is_valid_price};

const DATETIME_NAMES: &[&str] = &["datetime", "timestamp"];
const TICKER_NAMES: &[&str] = &["tickersymbol", "ticker"];
const PRICE_NAMES: &[&str] = &["price", "matched_price"];
const QUANTITY_NAMES: &[&str] = &["quantity", "volume", "matched_volume"];
const SIDE_NAMES: &[&str] = &["side"];
const TOTAL_NAMES: &[&str] = &["total", "cumulative_volume"];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    datetime: usize,
    ticker: usize,
    price: usize,
    quantity: usize,
    side: Option<usize>,
    total: Option<usize>,
}

impl ColumnMap {
    fn from_headers(path: &Path, headers: &StringRecord) -> Result<Self> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();
        let require = |aliases: &'static [&'static str]| {
            find_column(&names, aliases).ok_or_else(|| PlutusError::Schema {
                path: path.to_path_buf(),
                reason: format!("missing required column '{}'", aliases[0]),
            })
        };

        Ok(Self {
            datetime: require(DATETIME_NAMES)?,
            ticker: require(TICKER_NAMES)?,
            price: require(PRICE_NAMES)?,
            quantity: require(QUANTITY_NAMES)?,
            side: find_column(&names, SIDE_NAMES),
            total: find_column(&names, TOTAL_NAMES),
        })
    }
}

fn find_column(names: &[String], aliases: &[&str]) -> Option<usize> {
    names
        .iter()
        .position(|n| aliases.iter().any(|alias| *alias == n.as_str()))
}

/// Streaming reader over a raw CSV file.
#[derive(Debug)]
pub struct CsvTickStream {
    reader: Option<csv::Reader<File>>,
    columns: ColumnMap,
    ticker: Ticker,
    fields: TickFields,
    record: StringRecord,
    tally: RowTally,
}

impl CsvTickStream {
    pub(crate) fn open(file: &DatasetFile, fields: TickFields, tally: RowTally) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(File::open(&file.path)?);

        let headers = reader.headers().map_err(|e| PlutusError::Schema {
            path: file.path.clone(),
            reason: format!("unreadable header: {e}"),
        })?;
        let columns = ColumnMap::from_headers(&file.path, headers)?;

        Ok(Self {
            reader: Some(reader),
            columns,
            ticker: file.ticker.clone(),
            fields,
            record: StringRecord::new(),
            tally,
        })
    }

    /// Returns the counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> ReadStats {
        self.tally.stats()
    }

    /// Returns the path of the file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.tally.path()
    }

    fn parse_record(&self) -> std::result::Result<Tick, String> {
        let cell = |idx: usize| self.record.get(idx).unwrap_or("");
        let cols = &self.columns;

        let timestamp = parse_timestamp(cell(cols.datetime))
            .ok_or_else(|| format!("invalid datetime '{}'", cell(cols.datetime)))?;

        let symbol = cell(cols.ticker);
        if !self.ticker.matches(symbol) {
            return Err(format!(
                "ticker '{symbol}' does not match file ticker {}",
                self.ticker
            ));
        }

        let raw_price = cell(cols.price);
        let price: f64 = raw_price
            .parse()
            .map_err(|_| format!("invalid price '{raw_price}'"))?;
        if !is_valid_price(price) {
            return Err(format!("invalid price '{raw_price}'"));
        }

        let raw_quantity = cell(cols.quantity);
        let volume =
            parse_volume(raw_quantity).ok_or_else(|| format!("invalid quantity '{raw_quantity}'"))?;

        // Optional cells are validated even when not projected.
        let side = match cols.side.map(cell).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<TradeSide>()?),
            None => None,
        };
        let total = match cols.total.map(cell).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_volume(raw).ok_or_else(|| format!("invalid total '{raw}'"))?),
            None => None,
        };

        let tick = Tick::new(self.ticker.clone(), timestamp, price, volume)
            .with_side(side.filter(|_| self.fields.contains(TickField::Side)))
            .with_cumulative_volume(
                total.filter(|_| self.fields.contains(TickField::CumulativeVolume)),
            );
        Ok(tick)
    }
}

impl Iterator for CsvTickStream {
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            match reader.read_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => {
                    self.reader = None;
                    return self.tally.finish().map(Err);
                }
                Err(e) if e.is_io_error() => {
                    self.reader = None;
                    return Some(Err(PlutusError::Io(std::io::Error::other(e))));
                }
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    if let Some(err) = self.tally.reject(line, e.to_string()) {
                        self.reader = None;
                        return Some(Err(err));
                    }
                    continue;
                }
            }

            if self.record.iter().all(str::is_empty) {
                continue;
            }

            let line = self.record.position().map_or(0, |p| p.line());
            match self.parse_record() {
                Ok(tick) => {
                    self.tally.accept(&tick);
                    return Some(Ok(tick));
                }
                Err(reason) => {
                    if let Some(err) = self.tally.reject(line, reason) {
                        self.reader = None;
                        return Some(Err(err));
                    }
                }
            }
        }
    }
}

/// Parses a vendor timestamp as exchange-local time.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, a `T` separator, a bare date, and
/// drops a trailing `Z` or UTC offset.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_end_matches('Z');
    let s = match s.get(10..).and_then(|rest| rest.find(['+', '-'])) {
        Some(pos) => &s[..10 + pos],
        None => s,
    };
    let s = s.replacen('T', " ", 1);

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Parses a non-negative integral quantity, accepting forms like `100.0`.
fn parse_volume(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v: f64 = raw.parse().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64).then_some(v as u64)
}
