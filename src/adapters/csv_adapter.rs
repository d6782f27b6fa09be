//! CSV file data adapter.
//!
//! One file per instrument, `<base_path>/<instrument>.csv`, with a header row
//! and columns `timestamp,open,high,low,close,volume`. Rows are returned in
//! file order.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{instrument}.csv"))
    }

    fn read_all(&self, instrument: &str) -> Result<Vec<Bar>, BacktestError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| BacktestError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| BacktestError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let line = row + 2;

            let timestamp = parse_timestamp(field(&record, 0, "timestamp", line)?).ok_or_else(|| {
                BacktestError::Data {
                    reason: format!("line {line}: unrecognized timestamp"),
                }
            })?;

            bars.push(Bar::new(
                timestamp,
                number(&record, 1, "open", line)?,
                number(&record, 2, "high", line)?,
                number(&record, 3, "low", line)?,
                number(&record, 4, "close", line)?,
                number(&record, 5, "volume", line)?,
            ));
        }

        Ok(bars)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, BacktestError> {
    record.get(index).map(str::trim).ok_or_else(|| BacktestError::Data {
        reason: format!("line {line}: missing {name} column"),
    })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, BacktestError> {
    field(record, index, name, line)?
        .parse()
        .map_err(|e| BacktestError::Data {
            reason: format!("line {line}: invalid {name} value: {e}"),
        })
}

/// Accepts `YYYY-MM-DD HH:MM[:SS]`, the `T`-separated form, a bare date
/// (midnight) or integer Unix seconds.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, BacktestError> {
        let mut bars = self.read_all(instrument)?;
        bars.retain(|b| {
            start.is_none_or(|s| b.timestamp >= s) && end.is_none_or(|e| b.timestamp <= e)
        });
        Ok(bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, BacktestError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BacktestError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut instruments = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(instrument) = name.strip_suffix(".csv") {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }

    fn get_data_range(
        &self,
        instrument: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, BacktestError> {
        let bars = self.read_all(instrument)?;
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        Ok(first.zip(last).map(|(first, last)| (first, last, bars.len())))
    }
}
