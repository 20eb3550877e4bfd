//! models/arma.rs - ARMA(p, q) mean model, conditional sum of squares
//!
//! ─────────────────────────────────────────────────────────────────────────
//! MATHEMATICAL MODEL
//! ─────────────────────────────────────────────────────────────────────────
//!
//!   r_t − μ = Σᵢ φᵢ (r_{t−i} − μ) + ε_t + Σⱼ θⱼ ε_{t−j}
//!
//! Residuals are filtered with zero pre-sample values, so every order is
//! scored on the same n observations and AICs are comparable:
//!
//!   ε_t = (r_t − μ) − Σᵢ φᵢ (r_{t−i} − μ) − Σⱼ θⱼ ε_{t−j}
//!   σ̂²  = SSR / n
//!   ln L = −n/2 · (ln(2π σ̂²) + 1)
//!   AIC  = −2 ln L + 2k,   k = p + q + 2   (φ, θ, μ, σ²)
//!
//! Stationarity and invertibility are enforced by parametrising both
//! polynomials through partial autocorrelations (Jones 1980):
//!
//!   ρ_k = tanh(u_k) ∈ (−1, 1)  →  Durbin–Levinson  →  φ
//!   MA uses the same map with θ = −φ(u).
//!
//! The fit runs on the standardised window z = (r − r̄)/s; μ and σ² are
//! mapped back and ln L gets the Jacobian term −n·ln s.
//! ─────────────────────────────────────────────────────────────────────────

use std::f64::consts::PI;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::optim::{minimize, NelderMeadConfig};
use super::{mean, variance, ArmaOrder, FitOutcome};
use crate::error::{FitError, FitWarning};

/// |ρ| above this is reported as a unit root.
const BOUNDARY_PACF: f64 = 0.9999;

/// Fitted ARMA mean model (raw return scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmaFit {
    pub order: ArmaOrder,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub iterations: usize,
}

/// Minimum window length for `k` estimated parameters.
pub fn min_observations(k: usize) -> usize {
    3 * k + 10
}

/// Map unconstrained values to coefficients of a stationary AR polynomial.
pub fn pacf_to_coefs(raw: &[f64]) -> Vec<f64> {
    let p = raw.len();
    let mut phi: Vec<f64> = raw.iter().map(|u| u.tanh()).collect();
    let mut work = phi.clone();
    for j in 1..p {
        let a = phi[j];
        for k in 0..j {
            work[k] -= a * phi[j - k - 1];
        }
        phi[..j].copy_from_slice(&work[..j]);
    }
    phi
}

/// Inverse of `pacf_to_coefs`. Returns `None` if `phi` is not stationary.
pub fn coefs_to_pacf(phi: &[f64]) -> Option<Vec<f64>> {
    let p = phi.len();
    let mut new = phi.to_vec();
    let mut work = phi.to_vec();
    for j in (1..p).rev() {
        let a = new[j];
        if a.abs() >= 1.0 {
            return None;
        }
        for k in 0..j {
            work[k] = (new[k] + a * new[j - k - 1]) / (1.0 - a * a);
        }
        new[..j].copy_from_slice(&work[..j]);
    }
    if new.iter().any(|a| a.abs() >= 1.0) {
        return None;
    }
    Some(new.iter().map(|a| a.atanh()).collect())
}

/// Conditional residuals with zero pre-sample values.
pub fn arma_residuals(x: &[f64], mu: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut eps = Vec::with_capacity(x.len());
    for t in 0..x.len() {
        let mut e = x[t] - mu;
        for (i, phi) in ar.iter().enumerate() {
            if t > i {
                e -= phi * (x[t - i - 1] - mu);
            }
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                e -= theta * eps[t - j - 1];
            }
        }
        eps.push(e);
    }
    eps
}

/// Conditional mean for t = n given observations and residuals up to n−1.
pub fn next_mean(x: &[f64], eps: &[f64], mu: f64, ar: &[f64], ma: &[f64]) -> f64 {
    let n = x.len();
    let mut m = mu;
    for (i, phi) in ar.iter().enumerate() {
        if n > i {
            m += phi * (x[n - i - 1] - mu);
        }
    }
    for (j, theta) in ma.iter().enumerate() {
        if n > j {
            m += theta * eps[n - j - 1];
        }
    }
    m
}

/// Split an unconstrained parameter vector `[μ, u_ar.., u_ma..]`.
pub(crate) fn unpack_mean(theta: &Array1<f64>, order: ArmaOrder) -> (f64, Vec<f64>, Vec<f64>) {
    let raw = theta.as_slice().unwrap_or(&[]);
    let mu = raw.first().copied().unwrap_or(0.0);
    let ar = pacf_to_coefs(&raw[1..1 + order.p]);
    let ma: Vec<f64> = pacf_to_coefs(&raw[1 + order.p..1 + order.n_coefs()])
        .into_iter()
        .map(|c| -c)
        .collect();
    (mu, ar, ma)
}

pub(crate) fn boundary_warning(theta: &Array1<f64>, order: ArmaOrder) -> Option<FitWarning> {
    let at_bound = |u: &f64| u.tanh().abs() > BOUNDARY_PACF;
    let raw = theta.as_slice()?;
    if raw[1..1 + order.p].iter().any(at_bound) {
        return Some(FitWarning::UnitRoot("AR"));
    }
    if raw[1 + order.p..1 + order.n_coefs()].iter().any(at_bound) {
        return Some(FitWarning::UnitRoot("MA"));
    }
    None
}

/// Conditional-sum-of-squares ARMA estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmaEstimator {
    pub optim: NelderMeadConfig,
}

impl ArmaEstimator {
    pub fn new(optim: NelderMeadConfig) -> Self {
        Self { optim }
    }

    pub fn fit(&self, window: &[f64], order: ArmaOrder) -> FitOutcome<ArmaFit> {
        let n = window.len();
        let k = order.n_coefs() + 2;
        if n < min_observations(k) {
            return FitOutcome::Failed(FitError::TooShort { len: n, params: k });
        }
        let center = mean(window);
        let var = variance(window);
        if !(var > 1e-18) || !var.is_finite() {
            return FitOutcome::Failed(FitError::Degenerate);
        }
        let scale = var.sqrt();
        let z: Vec<f64> = window.iter().map(|r| (r - center) / scale).collect();

        let objective = |theta: &Array1<f64>| {
            let (mu, ar, ma) = unpack_mean(theta, order);
            let ssr: f64 = arma_residuals(&z, mu, &ar, &ma).iter().map(|e| e * e).sum();
            0.5 * n as f64 * (ssr / n as f64).ln()
        };

        let x0 = vec![0.0; 1 + order.n_coefs()];
        let Some(min) = minimize(objective, &x0, &self.optim) else {
            return FitOutcome::Failed(FitError::NonFiniteStart);
        };

        let (mu, ar, ma) = unpack_mean(&min.x, order);
        let ssr: f64 = arma_residuals(&z, mu, &ar, &ma).iter().map(|e| e * e).sum();
        let sigma2_std = ssr / n as f64;
        if !(sigma2_std > 0.0) || !sigma2_std.is_finite() {
            return FitOutcome::Failed(FitError::NonFinite("residual variance"));
        }

        let nf = n as f64;
        let log_likelihood = -0.5 * nf * ((2.0 * PI * sigma2_std).ln() + 1.0) - nf * scale.ln();
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;
        if !aic.is_finite() {
            return FitOutcome::Failed(FitError::NonFinite("AIC"));
        }

        let fit = ArmaFit {
            order,
            intercept: center + scale * mu,
            ar,
            ma,
            sigma2: sigma2_std * var,
            log_likelihood,
            aic,
            iterations: min.iterations,
        };

        let warning = if !min.converged {
            Some(FitWarning::NotConverged { iterations: min.iterations })
        } else {
            boundary_warning(&min.x, order)
        };
        FitOutcome::from_checked(fit, warning)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic pseudo-normal noise (LCG + Box–Muller), reproducible
    /// across platforms.
    pub(crate) fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
        };
        (0..n)
            .map(|_| {
                let (u1, u2) = (next(), next());
                (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
            })
            .collect()
    }

    pub(crate) fn simulate_ar1(n: usize, phi: f64, mu: f64, scale: f64, seed: u64) -> Vec<f64> {
        let e = noise(n + 50, seed);
        let mut x = vec![0.0; n + 50];
        for t in 1..n + 50 {
            x[t] = phi * x[t - 1] + e[t];
        }
        x[50..].iter().map(|v| mu + scale * v).collect()
    }

    #[test]
    fn pacf_round_trip() {
        let raw = vec![0.4, -0.9, 0.2];
        let phi = pacf_to_coefs(&raw);
        let back = coefs_to_pacf(&phi).expect("stationary");
        for (a, b) in raw.iter().zip(&back) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn single_pacf_is_tanh() {
        assert!((pacf_to_coefs(&[0.5])[0] - 0.5f64.tanh()).abs() < 1e-15);
    }

    #[test]
    fn residuals_of_pure_ar_recover_noise() {
        let x = vec![1.0, 1.5, 0.25, -0.5];
        let e = arma_residuals(&x, 0.0, &[0.5], &[]);
        assert_eq!(e[0], 1.0);
        assert!((e[1] - 1.0).abs() < 1e-12);
        assert!((e[2] - (0.25 - 0.75)).abs() < 1e-12);
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let x = simulate_ar1(600, 0.6, 0.001, 0.01, 7);
        let fit = ArmaEstimator::default()
            .fit(&x, ArmaOrder::new(1, 0))
            .into_clean()
            .expect("clean AR(1) fit");
        assert!((fit.ar[0] - 0.6).abs() < 0.1, "phi = {}", fit.ar[0]);
        assert!(fit.sigma2 > 0.0);
        assert!(fit.aic.is_finite());
    }

    #[test]
    fn ar1_beats_ma1_on_ar_data() {
        let x = simulate_ar1(400, 0.7, 0.0, 0.01, 11);
        let est = ArmaEstimator::default();
        let ar = est.fit(&x, ArmaOrder::new(1, 0)).into_clean().unwrap();
        let ma = est.fit(&x, ArmaOrder::new(0, 1)).into_clean().unwrap();
        assert!(ar.aic < ma.aic, "AR {} vs MA {}", ar.aic, ma.aic);
    }

    #[test]
    fn constant_window_is_degenerate() {
        let x = vec![0.01; 100];
        let out = ArmaEstimator::default().fit(&x, ArmaOrder::new(1, 1));
        assert_eq!(out, FitOutcome::Failed(FitError::Degenerate));
    }

    #[test]
    fn short_window_is_rejected() {
        let x = noise(12, 3);
        let out = ArmaEstimator::default().fit(&x, ArmaOrder::new(2, 2));
        assert!(matches!(out, FitOutcome::Failed(FitError::TooShort { .. })));
    }

    #[test]
    fn iteration_cap_flags_fit() {
        let x = simulate_ar1(300, 0.5, 0.0, 0.01, 5);
        let est = ArmaEstimator::new(NelderMeadConfig { max_iter: 2, ..Default::default() });
        let out = est.fit(&x, ArmaOrder::new(2, 2));
        assert!(matches!(out, FitOutcome::Flagged { warning: FitWarning::NotConverged { .. }, .. }));
    }

    #[test]
    fn next_mean_follows_last_deviation() {
        let x = [0.0, 0.0, -0.02];
        let eps = arma_residuals(&x, 0.0, &[0.5], &[]);
        assert!((next_mean(&x, &eps, 0.0, &[0.5], &[]) + 0.01).abs() < 1e-12);
    }
}
