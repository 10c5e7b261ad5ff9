//! Summary statistics over the most recent window of a price series.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::{Stage, StockcastError};
use super::ohlcv::PriceSeries;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub latest_date: NaiveDate,
    pub latest_close: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
    pub average_volume: f64,
    pub days_analyzed: usize,
}

/// Summarise the last `window` bars of `series`.
///
/// Change is measured from the first to the last close of the window. Mean
/// volume ignores forward-filled bars unless every bar in the window was
/// filled.
pub fn summarize(series: &PriceSeries, window: usize) -> Result<MetricsSnapshot, StockcastError> {
    if window == 0 || window > series.len() {
        return Err(StockcastError::InsufficientData {
            stage: Stage::Metrics,
            required: window.max(1),
            actual: series.len(),
        });
    }

    let bars = &series.bars()[series.len() - window..];
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(StockcastError::InsufficientData {
                stage: Stage::Metrics,
                required: window,
                actual: 0,
            });
        }
    };

    let absolute_change = last.close - first.close;
    let percent_change = if first.close != 0.0 {
        absolute_change / first.close * 100.0
    } else {
        0.0
    };

    let observed: Vec<i64> = bars.iter().filter(|b| !b.filled).map(|b| b.volume).collect();
    let volumes: Vec<i64> = if observed.is_empty() {
        bars.iter().map(|b| b.volume).collect()
    } else {
        observed
    };
    let average_volume = volumes.iter().map(|&v| v as f64).sum::<f64>() / volumes.len() as f64;

    Ok(MetricsSnapshot {
        latest_date: last.date,
        latest_close: last.close,
        absolute_change,
        percent_change,
        average_volume,
        days_analyzed: window,
    })
}

/// Summarise the whole series.
pub fn summarize_all(series: &PriceSeries) -> Result<MetricsSnapshot, StockcastError> {
    summarize(series, series.len())
}
