//! Per-ticker analysis pipeline.
//!
//! fetch → clean → summarize, then decomposition and forecast in parallel.
//! The first three stages are fatal; the last two are recorded in the bundle
//! as [`StageFailure`]s when they fail.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::config::AnalysisConfig;
use crate::domain::decompose::{DecompositionResult, decompose};
use crate::domain::error::{ErrorKind, Stage, StockcastError};
use crate::domain::forecast::{ForecastEngine, ForecastOutlook, ForecastResult, ModelCache};
use crate::domain::metrics::{MetricsSnapshot, summarize};
use crate::domain::ohlcv::{DateRange, PriceSeries};
use crate::domain::preprocess::clean;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageFailure {
    fn new(stage: Stage, err: &StockcastError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything the presentation layer needs for one ticker.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisBundle {
    pub ticker: String,
    pub range: DateRange,
    pub metrics: MetricsSnapshot,
    pub decomposition: Option<DecompositionResult>,
    pub forecast: Option<ForecastResult>,
    pub outlook: Option<ForecastOutlook>,
    pub failures: Vec<StageFailure>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub series: PriceSeries,
}

impl AnalysisBundle {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Analyzer<P> {
    config: AnalysisConfig,
    data_port: P,
    engine: ForecastEngine,
}

impl<P: DataPort> Analyzer<P> {
    pub fn new(config: AnalysisConfig, data_port: P) -> Self {
        let engine = ForecastEngine::new(&config.forecast);
        Self {
            config,
            data_port,
            engine,
        }
    }

    /// Reuse fitted models across calls with identical input.
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.engine = ForecastEngine::new(&self.config.forecast).with_cache(cache);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, ticker: &str, range: DateRange) -> Result<AnalysisBundle, StockcastError> {
        info!(ticker, start = %range.start, end = %range.end, "analysis started");

        let raw = self.data_port.fetch(ticker, range.start, range.end)?;
        if raw.is_empty() {
            return Err(StockcastError::NoData {
                ticker: ticker.to_string(),
            });
        }

        let cleaned = clean(ticker, &raw, &self.config.preprocess)?;
        let series = cleaned.series;
        let window = self.config.metrics_window.unwrap_or(series.len());
        let metrics = summarize(&series, window)?;

        let decomposition_config = &self.config.decomposition;
        let (decomposition, forecast) = rayon::join(
            || decompose(&series, decomposition_config.period, decomposition_config.model),
            || self.engine.forecast_default(&series),
        );

        let mut failures = Vec::new();
        let decomposition = decomposition
            .inspect_err(|err| {
                warn!(ticker, error = %err, "decomposition failed");
                failures.push(StageFailure::new(Stage::Decomposition, err));
            })
            .ok();
        let forecast = forecast
            .inspect_err(|err| {
                warn!(ticker, error = %err, "forecast failed");
                failures.push(StageFailure::new(Stage::Forecast, err));
            })
            .ok();

        let outlook = forecast
            .as_ref()
            .and_then(|f| ForecastOutlook::from_forecast(f, metrics.latest_close));

        info!(
            ticker,
            observations = series.len(),
            failures = failures.len(),
            "analysis finished"
        );

        Ok(AnalysisBundle {
            ticker: ticker.to_string(),
            range,
            metrics,
            decomposition,
            forecast,
            outlook,
            failures,
            warnings: cleaned.warnings,
            series,
        })
    }

    /// Analyse independent tickers in parallel; results keep input order.
    pub fn analyze_many(
        &self,
        tickers: &[String],
        range: DateRange,
    ) -> Vec<Result<AnalysisBundle, StockcastError>> {
        tickers
            .par_iter()
            .map(|ticker| self.analyze(ticker, range))
            .collect()
    }

    /// Analyse the configured tickers over the configured range.
    pub fn analyze_configured(&self) -> Vec<(String, Result<AnalysisBundle, StockcastError>)> {
        let results = self.analyze_many(&self.config.tickers, self.config.range);
        self.config.tickers.iter().cloned().zip(results).collect()
    }
}
