#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use stockcast::domain::calendar::business_days_after;
use stockcast::domain::config::{AnalysisConfig, RetryPolicy};
use stockcast::domain::error::StockcastError;
use stockcast::domain::forecast::{ForecastConfig, OrderSelection, SarimaOrder};
use stockcast::domain::ohlcv::{DateRange, OhlcvBar, PriceSeries, RawBar};
use stockcast::ports::data_port::DataPort;

/// Additive weekly pattern used by the synthetic series.
pub const WEEKLY_PATTERN: [f64; 5] = [2.0, -1.0, 0.5, -2.0, 0.5];

/// In-memory data port keyed by ticker.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<RawBar>>,
    pub errors: HashMap<String, String>,
    transient: Mutex<HashMap<String, usize>>,
    fetches: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            transient: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<RawBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    /// Every fetch of `ticker` fails with `DataUnavailable`.
    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    /// The first `failures` fetches of `ticker` fail with `DataUnavailable`.
    pub fn with_transient_errors(self, ticker: &str, failures: usize) -> Self {
        self.transient
            .lock()
            .unwrap()
            .insert(ticker.to_string(), failures);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<RawBar>, StockcastError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(ticker) {
            return Err(StockcastError::DataUnavailable {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        if let Some(remaining) = self.transient.lock().unwrap().get_mut(ticker) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StockcastError::DataUnavailable {
                    ticker: ticker.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
        }
        let range = DateRange {
            start: start_date,
            end: end_date,
        };
        Ok(self
            .data
            .get(ticker)
            .map(|bars| bars.iter().filter(|b| range.contains(b.date)).cloned().collect())
            .unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, StockcastError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Friday before the first synthetic bar.
pub fn series_anchor() -> NaiveDate {
    date(2021, 12, 31)
}

pub fn wide_range() -> DateRange {
    DateRange::new(date(2021, 1, 1), date(2025, 12, 31)).unwrap()
}

/// Noise-free value of the synthetic series at business-day index `t`.
pub fn seasonal_level(t: usize) -> f64 {
    100.0 + 0.05 * t as f64 + WEEKLY_PATTERN[t % 5]
}

/// Linear trend plus the weekly pattern plus Gaussian noise.
pub fn seasonal_closes(n: usize, noise_sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, noise_sd).unwrap();
    (0..n)
        .map(|t| seasonal_level(t) + noise.sample(&mut rng))
        .collect()
}

/// One complete row per business day after `after`.
pub fn raw_bars(after: NaiveDate, closes: &[f64]) -> Vec<RawBar> {
    business_days_after(after, closes.len())
        .into_iter()
        .zip(closes)
        .enumerate()
        .map(|(i, (date, &close))| {
            RawBar::complete(date, close, close + 1.0, close - 1.0, close, 1_000 + i as i64)
        })
        .collect()
}

pub fn price_series(ticker: &str, after: NaiveDate, closes: &[f64]) -> PriceSeries {
    let bars = business_days_after(after, closes.len())
        .into_iter()
        .zip(closes)
        .map(|(date, &close)| OhlcvBar {
            date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
            filled: false,
        })
        .collect();
    PriceSeries::new(ticker, bars).unwrap()
}

/// SARIMA(1,0,0)(0,1,1,5): cheap to fit and suited to the synthetic series.
pub fn weekly_order() -> SarimaOrder {
    SarimaOrder::new(1, 0, 0).seasonal(0, 1, 1, 5)
}

pub fn fixed_forecast_config() -> ForecastConfig {
    ForecastConfig {
        selection: OrderSelection::Fixed(weekly_order()),
        ..ForecastConfig::default()
    }
}

/// Analysis config over [`wide_range`] with a fixed model order and no retries.
pub fn test_config(tickers: &[&str]) -> AnalysisConfig {
    let mut config = AnalysisConfig::new(wide_range());
    config.tickers = tickers.iter().map(|t| t.to_string()).collect();
    config.retry = RetryPolicy::no_retry();
    config.forecast = fixed_forecast_config();
    config
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Write `<dir>/<ticker>.csv` from synthetic closes.
pub fn write_ticker_csv(dir: &std::path::Path, ticker: &str, closes: &[f64]) {
    let mut out = String::from("Date,Open,High,Low,Close,Volume\n");
    for bar in raw_bars(series_anchor(), closes) {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.date,
            bar.open.unwrap(),
            bar.high.unwrap(),
            bar.low.unwrap(),
            bar.close.unwrap(),
            bar.volume.unwrap()
        ));
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), out).unwrap();
}
