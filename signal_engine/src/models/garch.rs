//! models/garch.rs - ARMA(p,q) + GARCH(1,1) with SGED innovations
//!
//! ─────────────────────────────────────────────────────────────────────────
//! MATHEMATICAL MODEL
//! ─────────────────────────────────────────────────────────────────────────
//!
//! Mean (with intercept μ):
//!
//!   r_t = μ + Σᵢ φᵢ (r_{t−i} − μ) + Σⱼ θⱼ ε_{t−j} + ε_t
//!
//! GARCH(1,1): Bollerslev (1986)
//!
//!   ε_t = σ_t · z_t,        z_t ~ SGED(ξ, ν)   (zero mean, unit variance)
//!   σ²_t = ω  +  α · ε²_{t−1}  +  β · σ²_{t−1}
//!
//!   Constraints (covariance stationarity):
//!     ω > 0,  α ≥ 0,  β ≥ 0,  α + β < 1
//!
//!   Long-run (unconditional) variance:
//!       σ²_∞ = ω / (1 − α − β)
//!
//!   Multi-step forecast (h-step ahead):
//!       σ²_{t+h} = σ²_∞ + (α+β)^(h−1) · (σ²_{t+1} − σ²_∞)
//!
//!   σ²_0 = mean(ε²) over the window.
//!
//! Log-likelihood (maximised with Nelder–Mead on the standardised window):
//!
//!   ln L = Σ_t [ ln f_sged(ε_t / σ_t) − ½ ln σ²_t ]
//!
//! Parametrisation (unconstrained → constrained):
//!   ω = exp(u_ω),   α + β = P ∈ (0, P_MAX),   α = P·s,  β = P·(1−s)
//!   ξ ∈ (SKEW_MIN, SKEW_MAX),  ν ∈ (SHAPE_MIN, SHAPE_MAX)  via logistic maps
//! ─────────────────────────────────────────────────────────────────────────

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::arma::{
    arma_residuals, boundary_warning, coefs_to_pacf, min_observations, next_mean, unpack_mean,
    ArmaEstimator,
};
use super::optim::{minimize, NelderMeadConfig};
use super::sged::SkewedGed;
use super::{from_bounded, logistic, mean, to_bounded, variance, ArmaOrder, FitOutcome};
use crate::error::{FitError, FitWarning};

const PERSIST_MAX: f64 = 0.9999;
const PERSIST_WARN: f64 = 0.999;
const SKEW_MIN: f64 = 0.2;
const SKEW_MAX: f64 = 5.0;
const SHAPE_MIN: f64 = 0.6;
const SHAPE_MAX: f64 = 40.0;
/// Logistic output this close to 0 or 1 counts as "at the bound".
const BOUND_EPS: f64 = 1e-4;

/// GARCH(1,1) variance recursion.
///
/// `sigma2` is always the conditional variance of the *next* observation.
#[derive(Debug, Clone)]
pub struct Garch11 {
    /// ω: long-run variance weight
    pub omega: f64,
    /// α: ARCH (shock) coefficient
    pub alpha: f64,
    /// β: GARCH (persistence) coefficient
    pub beta: f64,
    /// Conditional variance of the next innovation
    pub sigma2: f64,
}

impl Garch11 {
    pub fn with_initial(omega: f64, alpha: f64, beta: f64, sigma2: f64) -> Self {
        Self { omega, alpha, beta, sigma2 }
    }

    /// Feed innovation ε_t; afterwards `sigma2` holds σ²_{t+1}.
    ///
    ///   σ²_{t+1} = ω + α·ε²_t + β·σ²_t
    pub fn update(&mut self, epsilon: f64) {
        self.sigma2 = self.omega + self.alpha * epsilon * epsilon + self.beta * self.sigma2;
    }

    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    pub fn long_run_variance(&self) -> f64 {
        self.omega / (1.0 - self.persistence())
    }

    /// h-step ahead variance forecast (h ≥ 1; h = 1 is `sigma2`).
    ///
    /// σ²_{t+h} = σ²_∞ + (α+β)^(h−1) · (σ²_{t+1} − σ²_∞)
    pub fn forecast_variance(&self, h: usize) -> f64 {
        let persistence = self.persistence();
        let longrun = self.long_run_variance();
        longrun + persistence.powi(h.max(1) as i32 - 1) * (self.sigma2 - longrun)
    }
}

/// Run GARCH(1,1) over an innovation series, return σ²_t for every t
/// (the variance each ε_t was drawn with).
pub fn garch_filter(garch: &mut Garch11, innovations: &[f64]) -> Vec<f64> {
    let mut variances = Vec::with_capacity(innovations.len());
    for &e in innovations {
        variances.push(garch.sigma2);
        garch.update(e);
    }
    variances
}

/// Residual distribution of the combined model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    SkewedGed,
}

/// Structure of the combined mean + variance model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmaGarchSpec {
    pub order: ArmaOrder,
    pub include_mean: bool,
    pub garch_order: (usize, usize),
    pub distribution: Distribution,
}

impl ArmaGarchSpec {
    /// GARCH(1,1), intercept, SGED innovations.
    pub fn new(order: ArmaOrder) -> Self {
        Self { order, include_mean: true, garch_order: (1, 1), distribution: Distribution::SkewedGed }
    }

    fn n_params(&self) -> usize {
        self.order.n_coefs() + usize::from(self.include_mean) + 3 + 2
    }
}

/// One-step-ahead forecast of the return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OneStepForecast {
    pub mean: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmaGarchFit {
    pub spec: ArmaGarchSpec,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    pub skew: f64,
    pub shape: f64,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub forecast: OneStepForecast,
}

struct Params {
    mu: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    omega: f64,
    alpha: f64,
    beta: f64,
    skew: f64,
    shape: f64,
}

fn unpack(theta: &Array1<f64>, spec: &ArmaGarchSpec) -> Params {
    let (mu, ar, ma) = unpack_mean(theta, spec.order);
    let base = 1 + spec.order.n_coefs();
    let persistence = to_bounded(theta[base + 1], 0.0, PERSIST_MAX);
    let share = logistic(theta[base + 2]);
    Params {
        mu: if spec.include_mean { mu } else { 0.0 },
        ar,
        ma,
        omega: theta[base].exp(),
        alpha: persistence * share,
        beta: persistence * (1.0 - share),
        skew: to_bounded(theta[base + 3], SKEW_MIN, SKEW_MAX),
        shape: to_bounded(theta[base + 4], SHAPE_MIN, SHAPE_MAX),
    }
}

/// Negative log-likelihood on the standardised window, or +∞.
fn neg_log_likelihood(z: &[f64], p: &Params) -> f64 {
    let Some(dist) = SkewedGed::new(p.skew, p.shape) else {
        return f64::INFINITY;
    };
    let eps = arma_residuals(z, p.mu, &p.ar, &p.ma);
    let init = (eps.iter().map(|e| e * e).sum::<f64>() / eps.len() as f64).max(1e-12);
    let mut garch = Garch11::with_initial(p.omega, p.alpha, p.beta, init);
    let mut ll = 0.0;
    for &e in &eps {
        let s2 = garch.sigma2;
        if !(s2 > 0.0) {
            return f64::INFINITY;
        }
        ll += dist.ln_pdf(e / s2.sqrt()) - 0.5 * s2.ln();
        garch.update(e);
    }
    -ll
}

/// Maximum-likelihood ARMA-GARCH(1,1)-SGED estimator.
#[derive(Debug, Clone, Copy)]
pub struct ArmaGarchEstimator {
    pub optim: NelderMeadConfig,
    /// Used for the mean-model warm start.
    pub mean_optim: NelderMeadConfig,
}

impl Default for ArmaGarchEstimator {
    fn default() -> Self {
        Self {
            optim: NelderMeadConfig { max_iter: 20_000, tolerance: 1e-9, initial_step: 0.2 },
            mean_optim: NelderMeadConfig::default(),
        }
    }
}

impl ArmaGarchEstimator {
    pub fn new(optim: NelderMeadConfig, mean_optim: NelderMeadConfig) -> Self {
        Self { optim, mean_optim }
    }

    pub fn fit(&self, window: &[f64], spec: ArmaGarchSpec) -> FitOutcome<ArmaGarchFit> {
        let n = window.len();
        let k = spec.n_params();
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

        let x0 = self.starting_values(window, center, scale, &spec);
        let objective = |theta: &Array1<f64>| neg_log_likelihood(&z, &unpack(theta, &spec));

        let Some(first) = minimize(&objective, &x0, &self.optim) else {
            return FitOutcome::Failed(FitError::NonFiniteStart);
        };
        // One restart from the optimum with a fresh simplex.
        let min = match first.x.as_slice().and_then(|x| minimize(&objective, x, &self.optim)) {
            Some(second) if second.fval <= first.fval => {
                let iterations = first.iterations + second.iterations;
                super::optim::Minimum { iterations, ..second }
            }
            _ => first,
        };
        if !min.fval.is_finite() {
            return FitOutcome::Failed(FitError::NonFinite("log-likelihood"));
        }

        let p = unpack(&min.x, &spec);
        let eps = arma_residuals(&z, p.mu, &p.ar, &p.ma);
        let init = (eps.iter().map(|e| e * e).sum::<f64>() / n as f64).max(1e-12);
        let mut garch = Garch11::with_initial(p.omega, p.alpha, p.beta, init);
        garch_filter(&mut garch, &eps);

        let mean_z = next_mean(&z, &eps, p.mu, &p.ar, &p.ma);
        let forecast = OneStepForecast { mean: center + scale * mean_z, variance: var * garch.forecast_variance(1) };
        if !forecast.mean.is_finite() || !(forecast.variance > 0.0) || !forecast.variance.is_finite() {
            return FitOutcome::Failed(FitError::NonFinite("forecast"));
        }

        let fit = ArmaGarchFit {
            spec,
            intercept: center + scale * p.mu,
            ar: p.ar,
            ma: p.ma,
            omega: p.omega * var,
            alpha: p.alpha,
            beta: p.beta,
            skew: p.skew,
            shape: p.shape,
            log_likelihood: -min.fval - n as f64 * scale.ln(),
            iterations: min.iterations,
            forecast,
        };
        let warning = self.check(&min, &fit);
        FitOutcome::from_checked(fit, warning)
    }

    fn starting_values(&self, window: &[f64], center: f64, scale: f64, spec: &ArmaGarchSpec) -> Vec<f64> {
        let order = spec.order;
        let mut x0 = vec![0.0; 1 + order.n_coefs()];
        if order.n_coefs() > 0 {
            let warm = match ArmaEstimator::new(self.mean_optim).fit(window, order) {
                FitOutcome::Fitted(fit) | FitOutcome::Flagged { fit, .. } => Some(fit),
                FitOutcome::Failed(_) => None,
            };
            if let Some(fit) = warm {
                let neg_ma: Vec<f64> = fit.ma.iter().map(|c| -c).collect();
                if let (Some(u_ar), Some(u_ma)) = (coefs_to_pacf(&fit.ar), coefs_to_pacf(&neg_ma)) {
                    x0[0] = (fit.intercept - center) / scale;
                    x0[1..1 + order.p].copy_from_slice(&u_ar);
                    x0[1 + order.p..].copy_from_slice(&u_ma);
                }
            }
        }
        // ω = 1 − P on the unit-variance scale, P = 0.9, α/P = 0.1
        let persistence: f64 = 0.9;
        x0.push((1.0 - persistence).ln());
        x0.push(from_bounded(persistence, 0.0, PERSIST_MAX));
        x0.push(from_bounded(0.1, 0.0, 1.0));
        x0.push(from_bounded(1.0, SKEW_MIN, SKEW_MAX));
        x0.push(from_bounded(2.0, SHAPE_MIN, SHAPE_MAX));
        x0
    }

    fn check(&self, min: &super::optim::Minimum, fit: &ArmaGarchFit) -> Option<FitWarning> {
        if !min.converged {
            return Some(FitWarning::NotConverged { iterations: min.iterations });
        }
        if let Some(w) = boundary_warning(&min.x, fit.spec.order) {
            return Some(w);
        }
        let persistence = fit.alpha + fit.beta;
        if persistence > PERSIST_WARN {
            return Some(FitWarning::Persistence(persistence));
        }
        let near = |v: f64, lo: f64, hi: f64| {
            let u = (v - lo) / (hi - lo);
            u < BOUND_EPS || u > 1.0 - BOUND_EPS
        };
        if near(fit.skew, SKEW_MIN, SKEW_MAX) {
            return Some(FitWarning::ParameterAtBound { name: "skew", value: fit.skew });
        }
        if near(fit.shape, SHAPE_MIN, SHAPE_MAX) {
            return Some(FitWarning::ParameterAtBound { name: "shape", value: fit.shape });
        }
        None
    }
}
