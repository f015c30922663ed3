//! Display utilities and output formatting for the plutus CLI.

use anyhow::{Context, Result};
use clap::ValueEnum;
use plutus_lib::{Bar, BarField, BarFields, Tick, TickField, TickFields};
use serde_json::{Map, Value};
use std::io::Write;

/// Timestamp format used in textual output.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Output format for query results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    Csv,
    Ndjson,
}

impl Format {
    /// Returns the file extension for this format.
    pub(crate) const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Ndjson => "ndjson",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Streams records to a sink, writing only the projected columns.
pub(crate) enum RecordWriter<W: Write> {
    Csv(csv::Writer<W>),
    Ndjson(W),
}

impl<W: Write> RecordWriter<W> {
    pub(crate) fn new(sink: W, format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv(csv::Writer::from_writer(sink)),
            Format::Ndjson => Self::Ndjson(sink),
        }
    }

    /// Writes the CSV header row; a no-op for NDJSON.
    pub(crate) fn write_header<'a>(&mut self, names: impl Iterator<Item = &'a str>) -> Result<()> {
        if let Self::Csv(writer) = self {
            writer.write_record(names)?;
        }
        Ok(())
    }

    pub(crate) fn write_tick(&mut self, tick: &Tick, fields: TickFields) -> Result<()> {
        let values = fields.iter().map(|f| (f.as_str(), tick_value(tick, f)));
        self.write_values(values)
    }

    pub(crate) fn write_bar(&mut self, bar: &Bar, fields: BarFields) -> Result<()> {
        let values = fields.iter().map(|f| (f.as_str(), bar_value(bar, f)));
        self.write_values(values)
    }

    fn write_values<'a>(&mut self, values: impl Iterator<Item = (&'a str, Value)>) -> Result<()> {
        match self {
            Self::Csv(writer) => {
                let row: Vec<String> = values.map(|(_, v)| csv_cell(&v)).collect();
                writer.write_record(&row)?;
            }
            Self::Ndjson(sink) => {
                let object: Map<String, Value> =
                    values.map(|(k, v)| (k.to_string(), v)).collect();
                serde_json::to_writer(&mut *sink, &object)?;
                sink.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self {
            Self::Csv(mut writer) => writer.flush().context("Failed to flush output")?,
            Self::Ndjson(mut sink) => sink.flush().context("Failed to flush output")?,
        }
        Ok(())
    }
}

fn tick_value(tick: &Tick, field: TickField) -> Value {
    match field {
        TickField::Ticker => Value::from(tick.ticker.as_str()),
        TickField::Timestamp => Value::from(tick.timestamp.format(TIMESTAMP_FORMAT).to_string()),
        TickField::Price => Value::from(tick.matched_price),
        TickField::Volume => Value::from(tick.matched_volume),
        TickField::Side => tick.side.map_or(Value::Null, |s| Value::from(s.code())),
        TickField::CumulativeVolume => tick.cumulative_volume.map_or(Value::Null, Value::from),
    }
}

fn bar_value(bar: &Bar, field: BarField) -> Value {
    match field {
        BarField::Ticker => Value::from(bar.ticker.as_str()),
        BarField::BarTime => Value::from(bar.bar_time.format(TIMESTAMP_FORMAT).to_string()),
        BarField::Interval => Value::from(bar.interval.as_str()),
        BarField::Open => Value::from(bar.open),
        BarField::High => Value::from(bar.high),
        BarField::Low => Value::from(bar.low),
        BarField::Close => Value::from(bar.close),
        BarField::Volume => Value::from(bar.volume),
        BarField::TickCount => Value::from(bar.tick_count),
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Formats a byte count for display.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
