//! Classical seasonal decomposition (centred moving average).
//!
//! Trend: centred moving average of width `period` (a 2×`period` filter for
//! even periods). The first and last `period / 2` points have no trend and no
//! residual; they are `None`, never zero.
//! Seasonal: per-position average of the detrended values, normalised to sum
//! to zero (additive) or average one (multiplicative), tiled over the series.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::stats::variance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionModel {
    Additive,
    Multiplicative,
}

impl fmt::Display for DecompositionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompositionModel::Additive => f.write_str("additive"),
            DecompositionModel::Multiplicative => f.write_str("multiplicative"),
        }
    }
}

impl FromStr for DecompositionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "additive" | "add" => Ok(DecompositionModel::Additive),
            "multiplicative" | "mul" => Ok(DecompositionModel::Multiplicative),
            other => Err(format!("unknown decomposition model '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecompositionConfig {
    pub period: usize,
    pub model: DecompositionModel,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            period: 30,
            model: DecompositionModel::Multiplicative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionResult {
    pub model: DecompositionModel,
    pub period: usize,
    pub dates: Vec<NaiveDate>,
    pub observed: Vec<f64>,
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<Option<f64>>,
}

impl DecompositionResult {
    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Recombined value at `index`, `None` where the trend is undefined.
    pub fn reconstruct(&self, index: usize) -> Option<f64> {
        let trend = self.trend.get(index).copied().flatten()?;
        let residual = self.residual.get(index).copied().flatten()?;
        let seasonal = *self.seasonal.get(index)?;
        Some(match self.model {
            DecompositionModel::Additive => trend + seasonal + residual,
            DecompositionModel::Multiplicative => trend * seasonal * residual,
        })
    }

    /// `max(0, 1 - var(R) / var(S + R))`, on logs for the multiplicative model.
    pub fn seasonal_strength(&self) -> f64 {
        seasonal_strength(&self.seasonal, &self.residual, self.model)
    }
}

pub(crate) fn seasonal_strength(
    seasonal: &[f64],
    residual: &[Option<f64>],
    model: DecompositionModel,
) -> f64 {
    let (seasonal, residual): (Vec<f64>, Vec<f64>) = residual
        .iter()
        .zip(seasonal)
        .filter_map(|(r, &s)| r.map(|r| (s, r)))
        .map(|(s, r)| match model {
            DecompositionModel::Additive => (s, r),
            DecompositionModel::Multiplicative => (s.ln(), r.ln()),
        })
        .unzip();

    let combined: Vec<f64> = seasonal.iter().zip(&residual).map(|(s, r)| s + r).collect();
    let total = variance(&combined);
    if !total.is_finite() || total <= f64::EPSILON {
        return 0.0;
    }
    (1.0 - variance(&residual) / total).max(0.0)
}

/// Decompose the closing prices of `series`.
pub fn decompose(
    series: &PriceSeries,
    period: usize,
    model: DecompositionModel,
) -> Result<DecompositionResult, StockcastError> {
    let observed = series.closes();
    let (trend, seasonal, residual) = decompose_values(&observed, period, model)?;
    Ok(DecompositionResult {
        model,
        period,
        dates: series.dates(),
        observed,
        trend,
        seasonal,
        residual,
    })
}

type Components = (Vec<Option<f64>>, Vec<f64>, Vec<Option<f64>>);

pub(crate) fn decompose_values(
    values: &[f64],
    period: usize,
    model: DecompositionModel,
) -> Result<Components, StockcastError> {
    let n = values.len();
    if period < 2 || period.saturating_mul(2) > n {
        return Err(StockcastError::InvalidPeriod { period, len: n });
    }
    if model == DecompositionModel::Multiplicative {
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| **v <= 0.0) {
            return Err(StockcastError::NonPositiveValues { index, value });
        }
    }

    let trend = centred_moving_average(values, period);

    let detrended: Vec<Option<f64>> = values
        .iter()
        .zip(&trend)
        .map(|(&v, t)| {
            t.map(|t| match model {
                DecompositionModel::Additive => v - t,
                DecompositionModel::Multiplicative => v / t,
            })
        })
        .collect();

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, value) in detrended.iter().enumerate() {
        if let Some(v) = value {
            sums[i % period] += v;
            counts[i % period] += 1;
        }
    }
    let mut cycle: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let cycle_mean = cycle.iter().sum::<f64>() / period as f64;
    for s in &mut cycle {
        match model {
            DecompositionModel::Additive => *s -= cycle_mean,
            DecompositionModel::Multiplicative => *s /= cycle_mean,
        }
    }

    let seasonal: Vec<f64> = (0..n).map(|i| cycle[i % period]).collect();

    let residual = values
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((&v, t), &s)| {
            t.map(|t| match model {
                DecompositionModel::Additive => v - t - s,
                DecompositionModel::Multiplicative => v / (t * s),
            })
        })
        .collect();

    Ok((trend, seasonal, residual))
}

fn centred_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];

    for i in half..n.saturating_sub(half) {
        let window = &values[i - half..=i + half];
        let sum = if period % 2 == 1 {
            window.iter().sum::<f64>()
        } else {
            let inner: f64 = window[1..window.len() - 1].iter().sum();
            inner + 0.5 * (window[0] + window[window.len() - 1])
        };
        trend[i] = Some(sum / period as f64);
    }

    trend
}
