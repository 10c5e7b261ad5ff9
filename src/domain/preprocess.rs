//! Raw series cleaning: business-day reindexing and forward-fill.
//!
//! Policy:
//! - rows are sorted by date; for a duplicated date the last row wins;
//! - weekend rows are discarded;
//! - leading and trailing rows without a close are dropped;
//! - a missing business day, or a row without a close, is forward-filled from
//!   the previous bar, up to `max_fill_gap` consecutive days;
//! - a longer hole breaks the series and only the most recent contiguous
//!   segment is kept;
//! - null open/high/low/volume fields on an otherwise valid row are taken from
//!   the previous bar (or the row's own close when there is none).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::calendar::{business_days_between, is_business_day};
use crate::domain::error::{Stage, StockcastError};
use crate::domain::ohlcv::{OhlcvBar, PriceSeries, RawBar};

/// One trading week covers exchange holidays.
pub const DEFAULT_MAX_FILL_GAP: usize = 5;
/// Six weekly cycles; decomposition checks its own minimum.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub max_fill_gap: usize,
    pub min_observations: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_fill_gap: DEFAULT_MAX_FILL_GAP,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanedSeries {
    pub series: PriceSeries,
    pub warnings: Vec<String>,
}

pub fn clean(
    ticker: &str,
    raw: &[RawBar],
    config: &PreprocessConfig,
) -> Result<CleanedSeries, StockcastError> {
    let mut by_date: BTreeMap<NaiveDate, &RawBar> = BTreeMap::new();
    let mut weekend_rows = 0usize;
    for row in raw {
        if is_business_day(row.date) {
            by_date.insert(row.date, row);
        } else {
            weekend_rows += 1;
        }
    }
    if weekend_rows > 0 {
        debug!(ticker, weekend_rows, "discarded weekend rows");
    }

    let with_close = || by_date.values().filter(|r| r.close.is_some());
    let (first, last) = match (with_close().next(), with_close().last()) {
        (Some(first), Some(last)) => (first.date, last.date),
        _ => {
            return Err(StockcastError::InsufficientData {
                stage: Stage::Preprocess,
                required: config.min_observations,
                actual: 0,
            });
        }
    };

    let mut warnings = Vec::new();
    let mut bars: Vec<OhlcvBar> = Vec::new();
    let mut pending: Vec<NaiveDate> = Vec::new();
    let mut filled_days = 0usize;

    for date in business_days_between(first, last) {
        let row = by_date.get(&date).filter(|r| r.close.is_some());
        let Some(row) = row else {
            pending.push(date);
            continue;
        };

        if !pending.is_empty() {
            if pending.len() > config.max_fill_gap {
                let message = format!(
                    "{} consecutive missing business days ({} to {}) exceed the fill limit of {}; \
                     discarding {} earlier bars",
                    pending.len(),
                    pending[0],
                    pending[pending.len() - 1],
                    config.max_fill_gap,
                    bars.len()
                );
                warn!(ticker, "{message}");
                warnings.push(message);
                bars.clear();
                filled_days = 0;
            } else if let Some(prev) = bars.last().cloned() {
                for &gap_date in &pending {
                    bars.push(OhlcvBar {
                        date: gap_date,
                        filled: true,
                        ..prev.clone()
                    });
                }
                filled_days += pending.len();
            }
            pending.clear();
        }

        bars.push(complete_row(row, bars.last()));
    }

    if filled_days > 0 {
        debug!(ticker, filled_days, "forward-filled missing business days");
        warnings.push(format!("{filled_days} missing business days forward-filled"));
    }

    if bars.len() < config.min_observations {
        return Err(StockcastError::InsufficientData {
            stage: Stage::Preprocess,
            required: config.min_observations,
            actual: bars.len(),
        });
    }

    Ok(CleanedSeries {
        series: PriceSeries::new(ticker, bars)?,
        warnings,
    })
}

fn complete_row(row: &RawBar, prev: Option<&OhlcvBar>) -> OhlcvBar {
    // Only called for rows with a close.
    let close = row.close.unwrap_or_default();
    let fill = |value: Option<f64>, carried: Option<f64>| value.or(carried).unwrap_or(close);
    OhlcvBar {
        date: row.date,
        open: fill(row.open, prev.map(|b| b.close)),
        high: fill(row.high, prev.map(|b| b.high.max(close))),
        low: fill(row.low, prev.map(|b| b.low.min(close))),
        close,
        volume: row.volume.or_else(|| prev.map(|b| b.volume)).unwrap_or(0),
        filled: false,
    }
}
