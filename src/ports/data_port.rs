//! Data access port trait.

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::RawBar;
use chrono::NaiveDate;

/// Source of raw daily bars.
///
/// Implementations return rows as stored upstream: possibly unsorted, with
/// duplicates, weekend rows or null fields. An unknown ticker is `Ok(vec![])`;
/// an upstream failure is `StockcastError::DataUnavailable`.
pub trait DataPort: Send + Sync {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, StockcastError>;

    /// Tickers this source can serve, when it can enumerate them.
    fn list_tickers(&self) -> Result<Vec<String>, StockcastError> {
        Ok(Vec::new())
    }
}
