//! Explicit analysis configuration, built from a [`ConfigPort`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::domain::decompose::{DecompositionConfig, DecompositionModel};
use crate::domain::error::StockcastError;
use crate::domain::forecast::{ForecastConfig, GridSpec, OrderSelection, SarimaOrder};
use crate::domain::ohlcv::DateRange;
use crate::domain::preprocess::PreprocessConfig;
use crate::domain::universe::{Universe, parse_tickers};
use crate::ports::config_port::ConfigPort;

/// Delay schedule between data-fetch retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed { delay: Duration },
    /// `base * factor^attempt`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Backoff {
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential { base, factor, max } => {
                let seconds = base.as_secs_f64() * factor.powi(attempt as i32);
                Duration::from_secs_f64(seconds.min(max.as_secs_f64()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(200),
                factor: 2.0,
                max: Duration::from_secs(5),
            },
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub range: DateRange,
    pub tickers: Vec<String>,
    pub csv_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub preprocess: PreprocessConfig,
    pub decomposition: DecompositionConfig,
    pub forecast: ForecastConfig,
    /// `None` summarises the whole series.
    pub metrics_window: Option<usize>,
}

impl AnalysisConfig {
    /// Defaults everywhere except the date range; tickers are the default
    /// universe.
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            tickers: Universe::default().tickers(),
            csv_dir: None,
            retry: RetryPolicy::default(),
            preprocess: PreprocessConfig::default(),
            decomposition: DecompositionConfig::default(),
            forecast: ForecastConfig::default(),
            metrics_window: None,
        }
    }

    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, StockcastError> {
        let start = required_date(port, "analysis", "start_date")?;
        let end = required_date(port, "analysis", "end_date")?;
        let range = DateRange::new(start, end)
            .map_err(|e| invalid("analysis", "end_date", e.to_string()))?;

        let tickers = match port.get_string("analysis", "tickers") {
            Some(raw) => {
                parse_tickers(&raw).map_err(|e| invalid("analysis", "tickers", e.to_string()))?
            }
            None => Universe::default().tickers(),
        };

        let config = Self {
            range,
            tickers,
            csv_dir: port.get_string("data", "csv_dir").map(PathBuf::from),
            retry: retry_from_port(port)?,
            preprocess: preprocess_from_port(port)?,
            decomposition: decomposition_from_port(port)?,
            forecast: forecast_from_port(port)?,
            metrics_window: match port.get_usize("metrics", "window", 0)? {
                0 => None,
                window => Some(window),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Range checks that do not depend on the data.
    pub fn validate(&self) -> Result<(), StockcastError> {
        if self.tickers.is_empty() {
            return Err(invalid("analysis", "tickers", "no tickers selected".into()));
        }
        if self.decomposition.period < 2 {
            return Err(invalid("decomposition", "period", "must be at least 2".into()));
        }
        if self.preprocess.min_observations < 2 {
            return Err(invalid("preprocess", "min_observations", "must be at least 2".into()));
        }
        let forecast = &self.forecast;
        if forecast.horizon == 0 {
            return Err(invalid("forecast", "horizon", "must be at least 1".into()));
        }
        if forecast.seasonal_period < 2 {
            return Err(invalid("forecast", "seasonal_period", "must be at least 2".into()));
        }
        if !(forecast.confidence_level > 0.0 && forecast.confidence_level < 1.0) {
            return Err(invalid(
                "forecast",
                "confidence_level",
                format!("{} is not in (0, 1)", forecast.confidence_level),
            ));
        }
        if forecast.fit_timeout.is_zero() {
            return Err(invalid("forecast", "fit_timeout_secs", "must be positive".into()));
        }
        Ok(())
    }
}

fn invalid(section: &str, key: &str, reason: String) -> StockcastError {
    StockcastError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn required_date(port: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, StockcastError> {
    let raw = port
        .get_string(section, key)
        .ok_or_else(|| StockcastError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| invalid(section, key, format!("'{raw}' is not a YYYY-MM-DD date: {e}")))
}

fn retry_from_port(port: &dyn ConfigPort) -> Result<RetryPolicy, StockcastError> {
    let max_retries = port.get_usize("retry", "max_retries", 3)?;
    let max_retries = u32::try_from(max_retries)
        .map_err(|_| invalid("retry", "max_retries", "too large".into()))?;
    let delay = Duration::from_millis(port.get_usize("retry", "backoff_ms", 200)? as u64);
    let backoff = match port
        .get_string("retry", "backoff")
        .unwrap_or_else(|| "exponential".to_string())
        .to_lowercase()
        .as_str()
    {
        "fixed" => Backoff::Fixed { delay },
        "exponential" => Backoff::Exponential {
            base: delay,
            factor: 2.0,
            max: Duration::from_millis(port.get_usize("retry", "max_backoff_ms", 5_000)? as u64),
        },
        other => {
            return Err(invalid(
                "retry",
                "backoff",
                format!("'{other}' is not fixed or exponential"),
            ));
        }
    };
    Ok(RetryPolicy {
        max_retries,
        backoff,
    })
}

fn preprocess_from_port(port: &dyn ConfigPort) -> Result<PreprocessConfig, StockcastError> {
    let defaults = PreprocessConfig::default();
    Ok(PreprocessConfig {
        max_fill_gap: port.get_usize("preprocess", "max_fill_gap", defaults.max_fill_gap)?,
        min_observations: port.get_usize(
            "preprocess",
            "min_observations",
            defaults.min_observations,
        )?,
    })
}

fn decomposition_from_port(port: &dyn ConfigPort) -> Result<DecompositionConfig, StockcastError> {
    let defaults = DecompositionConfig::default();
    let model = match port.get_string("decomposition", "model") {
        Some(raw) => DecompositionModel::from_str(&raw)
            .map_err(|e| invalid("decomposition", "model", e.to_string()))?,
        None => defaults.model,
    };
    Ok(DecompositionConfig {
        period: port.get_usize("decomposition", "period", defaults.period)?,
        model,
    })
}

/// Parse `p,d,q`.
fn parse_triple(section: &str, key: &str, raw: &str) -> Result<(usize, usize, usize), StockcastError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let parsed: Result<Vec<usize>, _> = parts.iter().map(|p| p.parse::<usize>()).collect();
    match parsed.as_deref() {
        Ok([a, b, c]) => Ok((*a, *b, *c)),
        _ => Err(invalid(section, key, format!("'{raw}' is not three comma-separated integers"))),
    }
}

fn forecast_from_port(port: &dyn ConfigPort) -> Result<ForecastConfig, StockcastError> {
    let defaults = ForecastConfig::default();
    let seasonal_period = port.get_usize("forecast", "seasonal_period", defaults.seasonal_period)?;

    let selection = match port
        .get_string("forecast", "selection")
        .unwrap_or_else(|| "auto".to_string())
        .to_lowercase()
        .as_str()
    {
        "auto" => {
            let grid = GridSpec::default();
            OrderSelection::Auto(GridSpec {
                max_p: port.get_usize("forecast", "max_p", grid.max_p)?,
                max_q: port.get_usize("forecast", "max_q", grid.max_q)?,
                max_seasonal_p: port.get_usize("forecast", "max_seasonal_p", grid.max_seasonal_p)?,
                max_seasonal_q: port.get_usize("forecast", "max_seasonal_q", grid.max_seasonal_q)?,
                max_d: port.get_usize("forecast", "max_d", grid.max_d)?,
                max_seasonal_d: port.get_usize("forecast", "max_seasonal_d", grid.max_seasonal_d)?,
            })
        }
        "fixed" => {
            let raw = port
                .get_string("forecast", "order")
                .unwrap_or_else(|| "1,1,1".to_string());
            let (p, d, q) = parse_triple("forecast", "order", &raw)?;
            let raw = port
                .get_string("forecast", "seasonal_order")
                .unwrap_or_else(|| "1,1,1".to_string());
            let (sp, sd, sq) = parse_triple("forecast", "seasonal_order", &raw)?;
            OrderSelection::Fixed(SarimaOrder::new(p, d, q).seasonal(sp, sd, sq, seasonal_period))
        }
        other => {
            return Err(invalid(
                "forecast",
                "selection",
                format!("'{other}' is not auto or fixed"),
            ));
        }
    };

    Ok(ForecastConfig {
        horizon: port.get_usize("forecast", "horizon", defaults.horizon)?,
        seasonal_period,
        confidence_level: port.get_double(
            "forecast",
            "confidence_level",
            defaults.confidence_level,
        )?,
        selection,
        max_restarts: port.get_usize("forecast", "max_restarts", defaults.max_restarts)?,
        fit_timeout: Duration::from_secs(port.get_usize(
            "forecast",
            "fit_timeout_secs",
            defaults.fit_timeout.as_secs() as usize,
        )? as u64),
        min_observations: port.get_usize(
            "forecast",
            "min_observations",
            defaults.min_observations,
        )?,
        min_seasonal_cycles: port.get_usize(
            "forecast",
            "min_seasonal_cycles",
            defaults.min_seasonal_cycles,
        )?,
    })
}
