//! Seasonal ARIMA forecasting of closing prices.
//!
//! [`ForecastEngine`] validates the request, picks the model order (fixed or
//! by AIC search), fits it by conditional sum of squares and projects the
//! close `horizon` business days ahead with central prediction intervals.

pub mod cache;
pub mod optimizer;
pub mod order;
pub mod sarima;
pub mod selection;
pub mod stationarity;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::calendar::business_days_after;
use crate::domain::error::{Stage, StockcastError};
use crate::domain::ohlcv::PriceSeries;

pub use cache::{CacheKey, ModelCache};
pub use optimizer::{FitBudget, NelderMead};
pub use order::{GridSpec, OrderSelection, SarimaOrder};
pub use sarima::FittedSarima;

pub const DEFAULT_HORIZON: usize = 30;
pub const DEFAULT_SEASONAL_PERIOD: usize = 5;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    pub horizon: usize,
    pub seasonal_period: usize,
    pub confidence_level: f64,
    pub selection: OrderSelection,
    pub max_restarts: usize,
    /// Wall-clock allowance for all fits of one request.
    pub fit_timeout: Duration,
    pub min_observations: usize,
    /// The series must also span this many seasonal cycles.
    pub min_seasonal_cycles: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            seasonal_period: DEFAULT_SEASONAL_PERIOD,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            selection: OrderSelection::default(),
            max_restarts: 3,
            fit_timeout: Duration::from_secs(30),
            min_observations: 30,
            min_seasonal_cycles: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub order: SarimaOrder,
    pub aic: f64,
    pub sigma2: f64,
    pub observations: usize,
}

impl From<&FittedSarima> for ModelSummary {
    fn from(model: &FittedSarima) -> Self {
        Self {
            order: model.order,
            aic: model.aic,
            sigma2: model.sigma2,
            observations: model.observations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    pub confidence_level: f64,
    pub model: ModelSummary,
}

impl ForecastResult {
    pub fn last(&self) -> Option<&ForecastPoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    /// Classify by interval width at the horizon, as a percentage of the
    /// point estimate.
    pub fn from_width_pct(width_pct: f64) -> Self {
        if width_pct < 10.0 {
            ConfidenceLabel::High
        } else if width_pct < 20.0 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceLabel::High => "High",
            ConfidenceLabel::Medium => "Medium",
            ConfidenceLabel::Low => "Low",
        };
        f.write_str(label)
    }
}

/// Headline numbers of a forecast relative to the latest close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastOutlook {
    pub final_price: f64,
    pub change_pct: f64,
    pub interval_width_pct: f64,
    pub label: ConfidenceLabel,
}

impl ForecastOutlook {
    pub fn from_forecast(forecast: &ForecastResult, latest_close: f64) -> Option<Self> {
        let last = forecast.last()?;
        let change_pct = if latest_close != 0.0 {
            (last.point_estimate - latest_close) / latest_close * 100.0
        } else {
            0.0
        };
        let width = last.upper_bound - last.lower_bound;
        let interval_width_pct = if last.point_estimate != 0.0 {
            width / last.point_estimate.abs() * 100.0
        } else {
            f64::INFINITY
        };
        Some(Self {
            final_price: last.point_estimate,
            change_pct,
            interval_width_pct,
            label: ConfidenceLabel::from_width_pct(interval_width_pct),
        })
    }
}

pub struct ForecastEngine {
    config: ForecastConfig,
    optimizer: NelderMead,
    cache: Option<Arc<ModelCache>>,
}

impl ForecastEngine {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            config: config.clone(),
            optimizer: NelderMead::default(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast with the configured horizon, period and confidence level.
    pub fn forecast_default(&self, series: &PriceSeries) -> Result<ForecastResult, StockcastError> {
        self.forecast(
            series,
            self.config.horizon,
            self.config.seasonal_period,
            self.config.confidence_level,
        )
    }

    pub fn forecast(
        &self,
        series: &PriceSeries,
        horizon: usize,
        seasonal_period: usize,
        confidence_level: f64,
    ) -> Result<ForecastResult, StockcastError> {
        if horizon == 0 {
            return Err(StockcastError::InvalidParameter {
                name: "horizon",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(StockcastError::InvalidParameter {
                name: "confidence_level",
                reason: format!("{confidence_level} is not in (0, 1)"),
            });
        }

        let model = self.fit(series, seasonal_period)?;
        let predictions = model.forecast(horizon, confidence_level)?;
        let last_date = series.last_date().ok_or(StockcastError::InsufficientData {
            stage: Stage::Forecast,
            required: 1,
            actual: 0,
        })?;

        let points = business_days_after(last_date, horizon)
            .into_iter()
            .zip(predictions)
            .map(|(date, p)| ForecastPoint {
                date,
                point_estimate: p.point,
                lower_bound: p.lower,
                upper_bound: p.upper,
            })
            .collect();

        Ok(ForecastResult {
            points,
            confidence_level,
            model: ModelSummary::from(&*model),
        })
    }

    /// Fit (or fetch from the cache) the model for `series` at `seasonal_period`.
    pub fn fit(
        &self,
        series: &PriceSeries,
        seasonal_period: usize,
    ) -> Result<Arc<FittedSarima>, StockcastError> {
        let len = series.len();
        if seasonal_period < 2 {
            return Err(StockcastError::InvalidPeriod {
                period: seasonal_period,
                len,
            });
        }
        let required = self
            .config
            .min_observations
            .max(self.config.min_seasonal_cycles.saturating_mul(seasonal_period));
        if len < required {
            return Err(StockcastError::InsufficientData {
                stage: Stage::Forecast,
                required,
                actual: len,
            });
        }

        let key = CacheKey {
            series_hash: series.content_hash(),
            seasonal_period,
            selection: self.config.selection,
        };
        if let Some(model) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(ticker = series.ticker(), "model cache hit");
            return Ok(model);
        }

        let closes = series.closes();
        let budget = FitBudget::new(self.config.fit_timeout, self.config.max_restarts);
        let fitted = match self.config.selection {
            OrderSelection::Fixed(order) => {
                let order = order.with_period(seasonal_period);
                sarima::fit(&closes, order, order.ar_lags(), &budget, &self.optimizer)?
            }
            OrderSelection::Auto(grid) => {
                let (d, seasonal_d) = stationarity::choose_differencing(
                    &closes,
                    seasonal_period,
                    grid.max_d,
                    grid.max_seasonal_d,
                );
                let candidates = grid.candidates(d, seasonal_d, seasonal_period);
                selection::select_best(&closes, &candidates, &budget, &self.optimizer)?
            }
        };
        info!(
            ticker = series.ticker(),
            order = %fitted.order,
            aic = fitted.aic,
            "fitted forecast model"
        );

        Ok(match &self.cache {
            Some(cache) => cache.insert(key, fitted),
            None => Arc::new(fitted),
        })
    }
}
