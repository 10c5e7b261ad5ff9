//! SARIMA order and order-selection strategy.

use std::fmt;

use serde::Serialize;

/// SARIMA(p,d,q)(P,D,Q)s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl SarimaOrder {
    /// Non-seasonal ARIMA(p,d,q).
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    pub fn seasonal(self, p: usize, d: usize, q: usize, period: usize) -> Self {
        Self {
            seasonal_p: p,
            seasonal_d: d,
            seasonal_q: q,
            period,
            ..self
        }
    }

    pub fn with_period(self, period: usize) -> Self {
        Self { period, ..self }
    }

    /// Highest AR lag of the expanded (non-integrated) polynomial.
    pub fn ar_lags(&self) -> usize {
        self.p + self.seasonal_p * self.period
    }

    pub fn ma_lags(&self) -> usize {
        self.q + self.seasonal_q * self.period
    }

    /// Observations consumed by differencing.
    pub fn diff_lags(&self) -> usize {
        self.d + self.seasonal_d * self.period
    }

    /// Number of free AR/MA coefficients.
    pub fn coefficient_count(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// A mean (drift) term is estimated for at most one order of differencing.
    pub fn includes_mean(&self) -> bool {
        self.d + self.seasonal_d < 2
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// Bounds of the automatic order search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GridSpec {
    pub max_p: usize,
    pub max_q: usize,
    pub max_seasonal_p: usize,
    pub max_seasonal_q: usize,
    pub max_d: usize,
    pub max_seasonal_d: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_q: 2,
            max_seasonal_p: 1,
            max_seasonal_q: 1,
            max_d: 2,
            max_seasonal_d: 1,
        }
    }
}

impl GridSpec {
    /// Every (p, q, P, Q) combination for the given differencing orders.
    pub fn candidates(&self, d: usize, seasonal_d: usize, period: usize) -> Vec<SarimaOrder> {
        let mut orders = Vec::new();
        for p in 0..=self.max_p {
            for q in 0..=self.max_q {
                for sp in 0..=self.max_seasonal_p {
                    for sq in 0..=self.max_seasonal_q {
                        orders.push(SarimaOrder::new(p, d, q).seasonal(sp, seasonal_d, sq, period));
                    }
                }
            }
        }
        orders
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSelection {
    /// Use this order as given; its seasonal period is replaced by the
    /// period of the forecast request.
    Fixed(SarimaOrder),
    /// Choose differencing internally, then search the grid by AIC.
    Auto(GridSpec),
}

impl Default for OrderSelection {
    fn default() -> Self {
        OrderSelection::Auto(GridSpec::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_counts() {
        let order = SarimaOrder::new(1, 1, 2).seasonal(1, 1, 1, 5);
        assert_eq!(order.ar_lags(), 6);
        assert_eq!(order.ma_lags(), 7);
        assert_eq!(order.diff_lags(), 6);
        assert_eq!(order.coefficient_count(), 5);
        assert!(!order.includes_mean());
        assert!(SarimaOrder::new(1, 1, 0).includes_mean());
    }

    #[test]
    fn display_matches_convention() {
        let order = SarimaOrder::new(1, 1, 1).seasonal(1, 1, 1, 5);
        assert_eq!(order.to_string(), "SARIMA(1,1,1)(1,1,1,5)");
    }

    #[test]
    fn grid_enumerates_all_combinations() {
        let grid = GridSpec::default();
        let candidates = grid.candidates(1, 0, 5);
        assert_eq!(candidates.len(), 3 * 3 * 2 * 2);
        assert!(candidates.iter().all(|o| o.d == 1 && o.seasonal_d == 0 && o.period == 5));
        assert_eq!(candidates[0], SarimaOrder::new(0, 1, 0).seasonal(0, 0, 0, 5));
    }

    #[test]
    fn with_period_overrides_only_period() {
        let order = SarimaOrder::new(1, 0, 1).seasonal(0, 1, 1, 12).with_period(5);
        assert_eq!(order.period, 5);
        assert_eq!(order.seasonal_q, 1);
    }
}
