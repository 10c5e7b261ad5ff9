//! OHLCV bar and price series representation.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::domain::error::StockcastError;

/// A row as delivered by the data source: any field but the date may be null.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

impl RawBar {
    /// A fully populated row.
    pub fn complete(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: i64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Synthesised by forward-filling a missing business day.
    pub filled: bool,
}

/// Cleaned daily series: strictly increasing dates, one bar per business day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Callers outside the preprocessor are expected to pass bars that are
    /// already sorted; unsorted or duplicated dates are rejected.
    pub fn new(ticker: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, StockcastError> {
        if let Some(i) = bars.windows(2).position(|w| w[0].date >= w[1].date) {
            return Err(StockcastError::InvalidParameter {
                name: "bars",
                reason: format!(
                    "dates must be strictly increasing ({} then {})",
                    bars[i].date,
                    bars[i + 1].date
                ),
            });
        }
        Ok(Self {
            ticker: ticker.into(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Hash over dates and closing prices, used to key fitted models.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.ticker.hash(&mut hasher);
        for bar in &self.bars {
            bar.date.hash(&mut hasher);
            bar.close.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Inclusive date range of an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StockcastError> {
        if start >= end {
            return Err(StockcastError::InvalidParameter {
                name: "date_range",
                reason: format!("start {start} must be before end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
