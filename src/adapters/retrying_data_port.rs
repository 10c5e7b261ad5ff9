//! Data port decorator that retries transient upstream failures.

use crate::domain::config::RetryPolicy;
use crate::domain::error::StockcastError;
use crate::domain::ohlcv::RawBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

/// Wraps a [`DataPort`] and retries `DataUnavailable` errors according to a
/// [`RetryPolicy`]. Empty results and every other error pass straight through.
pub struct RetryingDataPort<P> {
    inner: P,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<P: DataPort> RetryingDataPort<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the sleep function, e.g. with a no-op in tests.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: DataPort> DataPort for RetryingDataPort<P> {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, StockcastError> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(ticker, start_date, end_date) {
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff.delay(attempt);
                    attempt += 1;
                    warn!(
                        ticker,
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "data fetch failed, retrying"
                    );
                    (self.sleep)(delay);
                }
                result => return result,
            }
        }
    }

    fn list_tickers(&self) -> Result<Vec<String>, StockcastError> {
        self.inner.list_tickers()
    }
}
