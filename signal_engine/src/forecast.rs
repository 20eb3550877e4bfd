//! forecast.rs - Combined mean + variance fit and one-step forecast
//!
//! Wraps the ARMA-GARCH(1,1)-SGED estimator behind `VolatilityFitter`.
//! A fit that errors and a fit that completes with a warning are the same
//! thing to the caller: a failure.  There are no retries.

use crate::models::garch::{ArmaGarchEstimator, ArmaGarchSpec, OneStepForecast};
use crate::models::{ArmaOrder, FitFailure, FitOutcome};

pub trait VolatilityFitter: Sync {
    /// Fit GARCH(1,1) with an ARMA(`order`) mean and intercept, then
    /// forecast one step past the end of `window`.
    fn fit_forecast(&self, window: &[f64], order: ArmaOrder) -> FitOutcome<OneStepForecast>;
}

impl VolatilityFitter for ArmaGarchEstimator {
    fn fit_forecast(&self, window: &[f64], order: ArmaOrder) -> FitOutcome<OneStepForecast> {
        self.fit(window, ArmaGarchSpec::new(order)).map(|fit| fit.forecast)
    }
}

/// Fit and forecast, collapsing every non-clean outcome to `Err`.
pub fn forecast_window<V: VolatilityFitter + ?Sized>(
    fitter: &V,
    window: &[f64],
    order: ArmaOrder,
) -> Result<OneStepForecast, FitFailure> {
    fitter.fit_forecast(window, order).into_clean()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{FitError, FitWarning};

    /// Returns a fixed mean forecast for every window.
    pub(crate) struct ConstantForecast(pub(crate) f64);

    impl VolatilityFitter for ConstantForecast {
        fn fit_forecast(&self, _window: &[f64], _order: ArmaOrder) -> FitOutcome<OneStepForecast> {
            FitOutcome::Fitted(OneStepForecast { mean: self.0, variance: 1e-4 })
        }
    }

    /// Forecast = last observation of the window (sign follows the data).
    pub(crate) struct EchoLast;

    impl VolatilityFitter for EchoLast {
        fn fit_forecast(&self, window: &[f64], _order: ArmaOrder) -> FitOutcome<OneStepForecast> {
            match window.last() {
                Some(&mean) => FitOutcome::Fitted(OneStepForecast { mean, variance: 1e-4 }),
                None => FitOutcome::Failed(FitError::TooShort { len: 0, params: 1 }),
            }
        }
    }

    /// Always completes with a convergence warning.
    pub(crate) struct WarnsAlways;

    impl VolatilityFitter for WarnsAlways {
        fn fit_forecast(&self, _window: &[f64], _order: ArmaOrder) -> FitOutcome<OneStepForecast> {
            FitOutcome::Flagged {
                fit: OneStepForecast { mean: -1.0, variance: 1e-4 },
                warning: FitWarning::NotConverged { iterations: 1 },
            }
        }
    }

    #[test]
    fn warning_is_a_failure() {
        let out = forecast_window(&WarnsAlways, &[0.0; 5], ArmaOrder::new(1, 1));
        assert_eq!(out, Err(FitFailure::Warning(FitWarning::NotConverged { iterations: 1 })));
    }

    #[test]
    fn clean_fit_passes_forecast_through() {
        let out = forecast_window(&ConstantForecast(-0.002), &[0.0; 5], ArmaOrder::new(1, 0));
        assert_eq!(out.map(|f| f.mean), Ok(-0.002));
    }

    #[test]
    fn estimator_reports_degenerate_window_as_error() {
        let out = forecast_window(&ArmaGarchEstimator::default(), &[0.0; 100], ArmaOrder::new(1, 0));
        assert_eq!(out, Err(FitFailure::Error(FitError::Degenerate)));
    }
}
