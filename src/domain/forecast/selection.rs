//! Information-criterion order search.

use tracing::debug;

use super::optimizer::{FitBudget, NelderMead};
use super::order::SarimaOrder;
use super::sarima::{FittedSarima, fit};
use crate::domain::error::{ModelFitError, StockcastError};

/// Fit every candidate and return the one with the lowest AIC.
///
/// All candidates are conditioned on the same number of leading observations.
/// Candidates that fail are skipped; when none fits, the first failure is
/// returned. A timeout aborts the whole search.
pub fn select_best(
    y: &[f64],
    candidates: &[SarimaOrder],
    budget: &FitBudget,
    optimizer: &NelderMead,
) -> Result<FittedSarima, StockcastError> {
    if candidates.is_empty() {
        return Err(StockcastError::InvalidParameter {
            name: "candidates",
            reason: "order search needs at least one candidate".to_string(),
        });
    }
    let condition = candidates.iter().map(SarimaOrder::ar_lags).max().unwrap_or(0);

    let (best, first_error) = candidates.iter().try_fold(
        (None::<FittedSarima>, None::<StockcastError>),
        |(best, first_error), &order| match fit(y, order, condition, budget, optimizer) {
            Ok(fitted) => {
                debug!(%order, aic = fitted.aic, "candidate fitted");
                let better = best.as_ref().is_none_or(|b| fitted.aic < b.aic);
                Ok((if better { Some(fitted) } else { best }, first_error))
            }
            Err(err @ StockcastError::ModelFit(ModelFitError::Timeout { .. })) => Err(err),
            Err(err) => {
                debug!(%order, error = %err, "candidate skipped");
                Ok((best, first_error.or(Some(err))))
            }
        },
    )?;

    match (best, first_error) {
        (Some(fitted), _) => Ok(fitted),
        (None, Some(err)) => Err(err),
        (None, None) => Err(ModelFitError::NoConvergence { restarts: budget.max_restarts() }.into()),
    }
}
