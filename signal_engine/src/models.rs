//! models.rs - Estimators and the types they share
//!
//! The estimators are numerical black boxes for the rest of the engine:
//! callers only see `ArmaOrder`, `FitOutcome<T>` and the fitted records.

pub mod arma;
pub mod garch;
pub mod optim;
pub mod sged;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitWarning};

/// ARMA(p, q) mean-model order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArmaOrder {
    pub p: usize,
    pub q: usize,
}

impl ArmaOrder {
    /// Intercept-only mean. Never produced by the order search; only used
    /// as the fallback when no candidate fits.
    pub const WHITE_NOISE: ArmaOrder = ArmaOrder { p: 0, q: 0 };

    pub const fn new(p: usize, q: usize) -> Self {
        Self { p, q }
    }

    pub fn is_white_noise(&self) -> bool {
        self.p == 0 && self.q == 0
    }

    /// Number of ARMA coefficients (excluding the intercept).
    pub fn n_coefs(&self) -> usize {
        self.p + self.q
    }
}

impl fmt::Display for ArmaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARMA({},{})", self.p, self.q)
    }
}

/// Result of one estimator call.
///
/// `Flagged` carries a usable fit plus a warning.  The engine never treats
/// it as a success: `into_clean` collapses it to the same failure as
/// `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome<T> {
    Fitted(T),
    Failed(FitError),
    Flagged { fit: T, warning: FitWarning },
}

/// Why a fit was discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum FitFailure {
    Error(FitError),
    Warning(FitWarning),
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitFailure::Error(e) => write!(f, "error: {e}"),
            FitFailure::Warning(w) => write!(f, "warning: {w}"),
        }
    }
}

impl<T> FitOutcome<T> {
    /// Only an unconditionally clean fit survives.
    pub fn into_clean(self) -> Result<T, FitFailure> {
        match self {
            FitOutcome::Fitted(fit) => Ok(fit),
            FitOutcome::Failed(err) => Err(FitFailure::Error(err)),
            FitOutcome::Flagged { warning, .. } => Err(FitFailure::Warning(warning)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FitOutcome<U> {
        match self {
            FitOutcome::Fitted(fit) => FitOutcome::Fitted(f(fit)),
            FitOutcome::Failed(err) => FitOutcome::Failed(err),
            FitOutcome::Flagged { fit, warning } => FitOutcome::Flagged { fit: f(fit), warning },
        }
    }

    /// Attach a warning if `warning` is `Some`, otherwise keep `Fitted`.
    pub fn from_checked(fit: T, warning: Option<FitWarning>) -> Self {
        match warning {
            Some(warning) => FitOutcome::Flagged { fit, warning },
            None => FitOutcome::Fitted(fit),
        }
    }
}

// ── Numeric helpers shared by the estimators ──────────────────────────────

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance (divides by n).
pub(crate) fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64
}

pub(crate) fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub(crate) fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Map an unconstrained value into the open interval (lo, hi).
pub(crate) fn to_bounded(x: f64, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * logistic(x)
}

/// Inverse of `to_bounded`.
pub(crate) fn from_bounded(y: f64, lo: f64, hi: f64) -> f64 {
    logit((y - lo) / (hi - lo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagged_collapses_like_failed() {
        let flagged: FitOutcome<f64> = FitOutcome::Flagged {
            fit: 1.0,
            warning: FitWarning::NotConverged { iterations: 10 },
        };
        let failed: FitOutcome<f64> = FitOutcome::Failed(FitError::Degenerate);
        assert!(flagged.into_clean().is_err());
        assert!(failed.into_clean().is_err());
        assert_eq!(FitOutcome::Fitted(2.0).into_clean(), Ok(2.0));
    }

    #[test]
    fn bounded_transform_round_trips() {
        let y = to_bounded(0.3, 0.5, 50.0);
        assert!(y > 0.5 && y < 50.0);
        assert!((from_bounded(y, 0.5, 50.0) - 0.3).abs() < 1e-10);
    }

    #[test]
    fn order_display() {
        assert_eq!(ArmaOrder::new(2, 1).to_string(), "ARMA(2,1)");
        assert!(ArmaOrder::WHITE_NOISE.is_white_noise());
    }
}
