//! CSV file data adapter.
//!
//! One file per ticker, `<base_path>/<TICKER>.csv`, with a header row naming
//! `date`, `open`, `high`, `low`, `close` and `volume` columns in any order
//! (case-insensitive, extra columns ignored). Empty cells are read as nulls.

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::{DateRange, RawBar};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn columns(headers: &csv::StringRecord) -> Option<Columns> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Some(Columns {
            date: find("date")?,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            close: find("close")?,
            volume: find("volume"),
        })
    }
}

fn unavailable(ticker: &str, reason: String) -> StockcastError {
    StockcastError::DataUnavailable {
        ticker: ticker.to_string(),
        reason,
    }
}

fn cell<'a>(record: &'a csv::StringRecord, index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null") && !v.eq_ignore_ascii_case("nan"))
}

fn parse_field<T: std::str::FromStr>(
    ticker: &str,
    record: &csv::StringRecord,
    index: Option<usize>,
    name: &str,
) -> Result<Option<T>, StockcastError>
where
    T::Err: std::fmt::Display,
{
    cell(record, index)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| unavailable(ticker, format!("invalid {name} value '{v}': {e}")))
        })
        .transpose()
}

/// Volume may be written as a float and is rounded to whole shares.
fn parse_volume(
    ticker: &str,
    record: &csv::StringRecord,
    index: Option<usize>,
) -> Result<Option<i64>, StockcastError> {
    let Some(value) = parse_field::<f64>(ticker, record, index, "volume")? else {
        return Ok(None);
    };
    if !value.is_finite() || value < 0.0 || value >= i64::MAX as f64 {
        return Err(unavailable(ticker, format!("invalid volume value '{value}'")));
    }
    Ok(Some(value.round() as i64))
}

impl DataPort for CsvAdapter {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, StockcastError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(ticker, path = %path.display(), "no CSV file for ticker");
                return Ok(Vec::new());
            }
            Err(e) => return Err(unavailable(ticker, format!("failed to read {}: {e}", path.display()))),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| unavailable(ticker, format!("CSV header error: {e}")))?
            .clone();
        let columns = Self::columns(&headers)
            .ok_or_else(|| unavailable(ticker, "CSV needs date and close columns".to_string()))?;

        let range = DateRange {
            start: start_date,
            end: end_date,
        };
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(ticker, format!("CSV parse error: {e}")))?;

            let date_str = cell(&record, Some(columns.date))
                .ok_or_else(|| unavailable(ticker, "missing date value".to_string()))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| unavailable(ticker, format!("invalid date '{date_str}': {e}")))?;

            if !range.contains(date) {
                continue;
            }

            bars.push(RawBar {
                date,
                open: parse_field(ticker, &record, columns.open, "open")?,
                high: parse_field(ticker, &record, columns.high, "high")?,
                low: parse_field(ticker, &record, columns.low, "low")?,
                close: parse_field(ticker, &record, Some(columns.close), "close")?,
                volume: parse_volume(ticker, &record, columns.volume)?,
            });
        }

        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, StockcastError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut tickers = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}
