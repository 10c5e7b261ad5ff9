//! Conditional-sum-of-squares SARIMA estimation and forecasting.
//!
//! Polynomials are stored as coefficient vectors in the backshift operator,
//! lowest power first, with a leading 1.

use std::f64::consts::PI;

use serde::Serialize;

use super::optimizer::{FitBudget, NelderMead};
use super::order::SarimaOrder;
use crate::domain::error::{ModelFitError, Stage, StockcastError};
use crate::domain::stats::{mean, normal_quantile};

/// A SARIMA model fitted to one series.
#[derive(Debug, Clone, Serialize)]
pub struct FittedSarima {
    pub order: SarimaOrder,
    pub ar: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    /// Mean of the differenced series, 0 when no mean term is estimated.
    pub mean: f64,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    /// Residuals entering the sum of squares.
    pub observations: usize,
    #[serde(skip)]
    history: Vec<f64>,
    /// Innovations aligned with `history`, zero where not estimated.
    #[serde(skip)]
    residuals: Vec<f64>,
}

/// Point forecast and central interval for one step ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

pub(crate) fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 - c_1 B^step - c_2 B^{2 step} - ...`
fn ar_polynomial(coefficients: &[f64], step: usize) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] = -c;
    }
    poly
}

/// `1 + c_1 B^step + c_2 B^{2 step} + ...`
fn ma_polynomial(coefficients: &[f64], step: usize) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * step] = *c;
    }
    poly
}

/// `(1 - B)^d (1 - B^s)^D`
pub(crate) fn difference_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    for _ in 0..seasonal_d {
        poly = multiply(&poly, &ar_polynomial(&[1.0], period));
    }
    poly
}

/// Apply a backshift polynomial; the output is `poly.len() - 1` shorter.
pub(crate) fn apply_polynomial(values: &[f64], poly: &[f64]) -> Vec<f64> {
    let lags = poly.len() - 1;
    if values.len() <= lags {
        return Vec::new();
    }
    (lags..values.len())
        .map(|t| poly.iter().enumerate().map(|(k, c)| c * values[t - k]).sum())
        .collect()
}

/// Map unconstrained reals to the coefficients of a stationary
/// `1 - φ_1 B - ... - φ_n B^n` via partial autocorrelations.
pub(crate) fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let partial: Vec<f64> = unconstrained.iter().map(|x| x / x.hypot(1.0)).collect();
    let mut previous = vec![0.0; n];
    let mut current = vec![0.0; n];
    for k in 0..n {
        for i in 0..k {
            current[i] = previous[i] + partial[k] * previous[k - i - 1];
        }
        current[k] = partial[k];
        previous[..=k].copy_from_slice(&current[..=k]);
    }
    previous.iter().map(|y| -y).collect()
}

struct Coefficients {
    ar: Vec<f64>,
    seasonal_ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Parameter layout: `[ar | seasonal ar | ma | seasonal ma]`.
    fn from_params(order: &SarimaOrder, params: &[f64]) -> Self {
        let (ar, rest) = params.split_at(order.p);
        let (seasonal_ar, rest) = rest.split_at(order.seasonal_p);
        let (ma, seasonal_ma) = rest.split_at(order.q);
        let invertible =
            |x: &[f64]| -> Vec<f64> { constrain_stationary(x).into_iter().map(|c| -c).collect() };
        Self {
            ar: constrain_stationary(ar),
            seasonal_ar: constrain_stationary(seasonal_ar),
            ma: invertible(ma),
            seasonal_ma: invertible(seasonal_ma),
        }
    }

    fn ar_full(&self, period: usize) -> Vec<f64> {
        multiply(
            &ar_polynomial(&self.ar, 1),
            &ar_polynomial(&self.seasonal_ar, period),
        )
    }

    fn ma_full(&self, period: usize) -> Vec<f64> {
        multiply(
            &ma_polynomial(&self.ma, 1),
            &ma_polynomial(&self.seasonal_ma, period),
        )
    }
}

/// Innovations of the ARMA recursion on a demeaned stationary series.
/// Entries before `start` are zero.
fn innovations(z: &[f64], ar: &[f64], ma: &[f64], start: usize) -> Vec<f64> {
    let mut e = vec![0.0; z.len()];
    for t in start..z.len() {
        let mut value: f64 = ar
            .iter()
            .enumerate()
            .map(|(k, c)| c * z[t - k])
            .sum();
        for (j, m) in ma.iter().enumerate().skip(1) {
            if j > t {
                break;
            }
            value -= m * e[t - j];
        }
        e[t] = value;
    }
    e
}

fn sum_of_squares(e: &[f64], start: usize) -> f64 {
    e[start..].iter().map(|v| v * v).sum()
}

/// Fit `order` to `y` by conditional sum of squares.
///
/// `condition` is the number of leading differenced observations excluded
/// from the sum of squares. It is raised to the order's AR lag count when
/// smaller, and should be equal across fits whose AIC values are compared.
pub fn fit(
    y: &[f64],
    order: SarimaOrder,
    condition: usize,
    budget: &FitBudget,
    optimizer: &NelderMead,
) -> Result<FittedSarima, StockcastError> {
    let diff = difference_polynomial(order.d, order.seasonal_d, order.period);
    let w = apply_polynomial(y, &diff);
    let start = condition.max(order.ar_lags());
    let k = order.coefficient_count() + usize::from(order.includes_mean());
    let required = order.diff_lags() + start + k + 2;
    if y.len() < required {
        return Err(StockcastError::InsufficientData {
            stage: Stage::Forecast,
            required,
            actual: y.len(),
        });
    }

    let mu = if order.includes_mean() { mean(&w) } else { 0.0 };
    let z: Vec<f64> = w.iter().map(|v| v - mu).collect();
    let n_eff = (z.len() - start) as f64;

    let objective = |params: &[f64]| {
        let coefficients = Coefficients::from_params(&order, params);
        let e = innovations(
            &z,
            &coefficients.ar_full(order.period),
            &coefficients.ma_full(order.period),
            start,
        );
        let sse = sum_of_squares(&e, start);
        if !sse.is_finite() {
            return f64::INFINITY;
        }
        0.5 * n_eff * (sse.max(f64::MIN_POSITIVE) / n_eff).ln()
    };

    let minimum = optimizer.minimize(objective, &vec![0.0; order.coefficient_count()], budget)?;

    let coefficients = Coefficients::from_params(&order, &minimum.point);
    let e = innovations(
        &z,
        &coefficients.ar_full(order.period),
        &coefficients.ma_full(order.period),
        start,
    );
    let sse = sum_of_squares(&e, start).max(f64::MIN_POSITIVE);
    let sigma2 = sse / n_eff;
    let log_likelihood = -0.5 * n_eff * ((2.0 * PI * sigma2).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * (k as f64 + 1.0);
    if !aic.is_finite() {
        return Err(ModelFitError::NonFinite { what: "likelihood" }.into());
    }

    let mut residuals = vec![0.0; order.diff_lags()];
    residuals.extend(e);

    Ok(FittedSarima {
        order,
        ar: coefficients.ar,
        seasonal_ar: coefficients.seasonal_ar,
        ma: coefficients.ma,
        seasonal_ma: coefficients.seasonal_ma,
        mean: mu,
        sigma2,
        log_likelihood,
        aic,
        observations: z.len() - start,
        history: y.to_vec(),
        residuals,
    })
}

impl FittedSarima {
    fn ar_full(&self) -> Vec<f64> {
        multiply(
            &ar_polynomial(&self.ar, 1),
            &ar_polynomial(&self.seasonal_ar, self.order.period),
        )
    }

    fn ma_full(&self) -> Vec<f64> {
        multiply(
            &ma_polynomial(&self.ma, 1),
            &ma_polynomial(&self.seasonal_ma, self.order.period),
        )
    }

    /// MA(∞) weights ψ_0..ψ_{horizon-1} of the integrated model.
    pub fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let diff = difference_polynomial(self.order.d, self.order.seasonal_d, self.order.period);
        let integrated = multiply(&self.ar_full(), &diff);
        let ma = self.ma_full();

        let mut psi = Vec::with_capacity(horizon);
        for j in 0..horizon {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = ma.get(j).copied().unwrap_or(0.0);
            for k in 1..=j.min(integrated.len() - 1) {
                value -= integrated[k] * psi[j - k];
            }
            psi.push(value);
        }
        psi
    }

    /// Forecast `horizon` steps past the end of the history with central
    /// intervals at `confidence_level`.
    pub fn forecast(
        &self,
        horizon: usize,
        confidence_level: f64,
    ) -> Result<Vec<Prediction>, ModelFitError> {
        let ar = self.ar_full();
        let diff = difference_polynomial(self.order.d, self.order.seasonal_d, self.order.period);
        let integrated = multiply(&ar, &diff);
        let ma = self.ma_full();
        let constant = self.mean * ar.iter().sum::<f64>();

        let n = self.history.len();
        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        y.reserve(horizon);
        e.reserve(horizon);

        for t in n..n + horizon {
            let mut value = constant;
            for (k, a) in integrated.iter().enumerate().skip(1) {
                if k > t {
                    break;
                }
                value -= a * y[t - k];
            }
            for (j, m) in ma.iter().enumerate().skip(1) {
                if j > t {
                    break;
                }
                value += m * e[t - j];
            }
            y.push(value);
            e.push(0.0);
        }

        let z = normal_quantile(0.5 + confidence_level / 2.0);
        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        let mut predictions = Vec::with_capacity(horizon);
        for (h, point) in y[n..].iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let half_width = z * (self.sigma2 * cumulative).sqrt();
            if !point.is_finite() {
                return Err(ModelFitError::NonFinite { what: "forecast" });
            }
            if !half_width.is_finite() {
                return Err(ModelFitError::NonFinite { what: "forecast variance" });
            }
            predictions.push(Prediction {
                point: *point,
                lower: point - half_width,
                upper: point + half_width,
            });
        }
        Ok(predictions)
    }
}
