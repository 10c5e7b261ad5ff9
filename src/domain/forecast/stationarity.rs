//! Choice of regular and seasonal differencing orders.

use tracing::debug;

use super::sarima::{apply_polynomial, difference_polynomial};
use crate::domain::decompose::{DecompositionModel, decompose_values, seasonal_strength};
use crate::domain::stats::mean;

/// 5 % critical value of the KPSS level-stationarity test.
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;
/// Seasonal strength above which one seasonal difference is taken.
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// KPSS statistic for level stationarity with a Bartlett long-run variance
/// and `trunc(4 (n/100)^(1/4))` lags.
pub fn kpss_level(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let m = mean(values);
    let e: Vec<f64> = values.iter().map(|v| v - m).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for v in &e {
        partial += v;
        eta += partial * partial;
    }
    let nf = n as f64;
    eta /= nf * nf;

    let lags = ((4.0 * (nf / 100.0).powf(0.25)) as usize).min(n - 1);
    let mut s2 = e.iter().map(|v| v * v).sum::<f64>() / nf;
    for lag in 1..=lags {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let autocovariance: f64 = (lag..n).map(|t| e[t] * e[t - lag]).sum::<f64>() / nf;
        s2 += 2.0 * weight * autocovariance;
    }
    if s2 <= 0.0 || !s2.is_finite() {
        return 0.0;
    }
    eta / s2
}

/// Seasonal strength of `values` at `period` under an additive decomposition,
/// or 0 when the series is too short to decompose.
pub fn seasonal_strength_at(values: &[f64], period: usize) -> f64 {
    match decompose_values(values, period, DecompositionModel::Additive) {
        Ok((_, seasonal, residual)) => {
            seasonal_strength(&seasonal, &residual, DecompositionModel::Additive)
        }
        Err(_) => 0.0,
    }
}

/// Returns `(d, D)`: seasonal differencing first, then as many regular
/// differences as the KPSS test asks for.
pub fn choose_differencing(
    values: &[f64],
    period: usize,
    max_d: usize,
    max_seasonal_d: usize,
) -> (usize, usize) {
    let strength = seasonal_strength_at(values, period);
    let seasonal_d = usize::from(max_seasonal_d > 0 && strength > SEASONAL_STRENGTH_THRESHOLD);

    let mut w = apply_polynomial(values, &difference_polynomial(0, seasonal_d, period));
    let mut d = 0;
    while d < max_d && w.len() > 3 && kpss_level(&w) > KPSS_CRITICAL_5PCT {
        w = apply_polynomial(&w, &[1.0, -1.0]);
        d += 1;
    }
    debug!(strength, d, seasonal_d, "selected differencing orders");
    (d, seasonal_d)
}
