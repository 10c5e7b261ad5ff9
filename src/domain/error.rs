//! Domain error types.

use serde::Serialize;
use std::time::Duration;

/// Pipeline stage an error or warning is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Preprocess,
    Decomposition,
    Forecast,
    Metrics,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Preprocess => "preprocess",
            Stage::Decomposition => "decomposition",
            Stage::Forecast => "forecast",
            Stage::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// Why a SARIMA fit was abandoned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelFitError {
    #[error("optimizer did not converge after {restarts} restarts")]
    NoConvergence { restarts: usize },

    #[error("fit exceeded its time budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("non-finite {what} produced by fitted model")]
    NonFinite { what: &'static str },
}

/// Top-level error type for stockcast.
#[derive(Debug, thiserror::Error)]
pub enum StockcastError {
    #[error("insufficient data for {stage}: have {actual} observations, need {required}")]
    InsufficientData {
        stage: Stage,
        required: usize,
        actual: usize,
    },

    #[error("invalid seasonal period {period} for series of length {len}")]
    InvalidPeriod { period: usize, len: usize },

    #[error("model fit failed: {0}")]
    ModelFit(#[from] ModelFitError),

    #[error("data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("no data returned for {ticker}")]
    NoData { ticker: String },

    #[error("multiplicative model needs positive values, found {value} at index {index}")]
    NonPositiveValues { index: usize, value: f64 },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Serialisable error family, handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    InvalidPeriod,
    ModelFit,
    DataUnavailable,
    NoData,
    InvalidInput,
    Config,
    Io,
}

impl StockcastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockcastError::InsufficientData { .. } => ErrorKind::InsufficientData,
            StockcastError::InvalidPeriod { .. } => ErrorKind::InvalidPeriod,
            StockcastError::ModelFit(_) => ErrorKind::ModelFit,
            StockcastError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            StockcastError::NoData { .. } => ErrorKind::NoData,
            StockcastError::NonPositiveValues { .. }
            | StockcastError::InvalidParameter { .. } => ErrorKind::InvalidInput,
            StockcastError::ConfigParse { .. }
            | StockcastError::ConfigMissing { .. }
            | StockcastError::ConfigInvalid { .. } => ErrorKind::Config,
            StockcastError::Io(_) => ErrorKind::Io,
        }
    }

    /// Transient upstream failures are the only errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StockcastError::DataUnavailable { .. })
    }
}

impl From<&StockcastError> for std::process::ExitCode {
    fn from(err: &StockcastError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Config => 2,
            ErrorKind::DataUnavailable => 3,
            ErrorKind::NoData | ErrorKind::InsufficientData => 5,
            ErrorKind::InvalidPeriod | ErrorKind::InvalidInput => 6,
            ErrorKind::ModelFit => 7,
        };
        std::process::ExitCode::from(code)
    }
}
