//! models/sged.rs - Skewed Generalized Error Distribution
//!
//! ─────────────────────────────────────────────────────────────────────────
//! MATHEMATICAL MODEL
//! ─────────────────────────────────────────────────────────────────────────
//!
//! Standardised GED with shape ν (ν = 2 is the normal, ν = 1 Laplace):
//!
//!   λ   = √( 2^(−2/ν) · Γ(1/ν) / Γ(3/ν) )
//!   g   = ν / ( λ · 2^(1+1/ν) · Γ(1/ν) )
//!   f(x) = g · exp( −½ |x/λ|^ν )
//!
//! Fernández–Steel skewing with ξ > 0 (ξ = 1 is symmetric), re-standardised
//! to zero mean and unit variance:
//!
//!   m₁ = 2^(1/ν) · λ · Γ(2/ν) / Γ(1/ν)          (E|X|)
//!   μ  = m₁ (ξ − 1/ξ)
//!   σ  = √( (1 − m₁²)(ξ² + 1/ξ²) + 2m₁² − 1 )
//!   y  = zσ + μ,   Ξ = ξ if y ≥ 0 else 1/ξ
//!
//!   f_sged(z) = 2/(ξ + 1/ξ) · f(y/Ξ) · σ
//! ─────────────────────────────────────────────────────────────────────────

use std::f64::consts::LN_2;

use statrs::function::gamma::ln_gamma;

#[derive(Debug, Clone, Copy)]
pub struct SkewedGed {
    pub skew: f64,
    pub shape: f64,
    lambda: f64,
    ln_norm: f64,
    mu: f64,
    sigma: f64,
}

impl SkewedGed {
    /// Returns `None` for parameters outside the valid domain.
    pub fn new(skew: f64, shape: f64) -> Option<Self> {
        if !(skew > 0.0 && shape > 0.0 && skew.is_finite() && shape.is_finite()) {
            return None;
        }
        let inv = 1.0 / shape;
        let ln_lambda = 0.5 * (-2.0 * inv * LN_2 + ln_gamma(inv) - ln_gamma(3.0 * inv));
        let lambda = ln_lambda.exp();
        let ln_g = shape.ln() - ln_lambda - (1.0 + inv) * LN_2 - ln_gamma(inv);

        let m1 = (inv * LN_2 + ln_lambda + ln_gamma(2.0 * inv) - ln_gamma(inv)).exp();
        let mu = m1 * (skew - 1.0 / skew);
        let var = (1.0 - m1 * m1) * (skew * skew + 1.0 / (skew * skew)) + 2.0 * m1 * m1 - 1.0;
        if !(var > 0.0 && var.is_finite()) {
            return None;
        }
        let sigma = var.sqrt();

        let ln_norm = (2.0 / (skew + 1.0 / skew)).ln() + ln_g + sigma.ln();
        Some(Self { skew, shape, lambda, ln_norm, mu, sigma })
    }

    /// Log density of a standardised residual z.
    pub fn ln_pdf(&self, z: f64) -> f64 {
        let y = z * self.sigma + self.mu;
        let xi = if y >= 0.0 { self.skew } else { 1.0 / self.skew };
        self.ln_norm - 0.5 * (y / (xi * self.lambda)).abs().powf(self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{Continuous, Normal};

    fn pdf(d: &SkewedGed, z: f64) -> f64 {
        d.ln_pdf(z).exp()
    }

    #[test]
    fn symmetric_shape_two_is_standard_normal() {
        let d = SkewedGed::new(1.0, 2.0).unwrap();
        let n = Normal::new(0.0, 1.0).unwrap();
        for &z in &[-2.5, -1.0, 0.0, 0.3, 1.7] {
            assert!((d.ln_pdf(z) - n.ln_pdf(z)).abs() < 1e-10, "z = {z}");
        }
    }

    #[test]
    fn density_integrates_to_one_with_zero_mean_unit_variance() {
        let d = SkewedGed::new(1.4, 1.3).unwrap();
        let (lo, hi, steps) = (-20.0, 20.0, 200_000);
        let h = (hi - lo) / steps as f64;
        let (mut mass, mut m1, mut m2) = (0.0, 0.0, 0.0);
        for i in 0..steps {
            let z = lo + (i as f64 + 0.5) * h;
            let p = pdf(&d, z) * h;
            mass += p;
            m1 += z * p;
            m2 += z * z * p;
        }
        assert!((mass - 1.0).abs() < 1e-6, "mass = {mass}");
        assert!(m1.abs() < 1e-6, "mean = {m1}");
        assert!((m2 - 1.0).abs() < 1e-5, "var = {m2}");
    }

    #[test]
    fn skew_above_one_puts_more_mass_right() {
        let d = SkewedGed::new(1.5, 2.0).unwrap();
        let right: f64 = (0..1000).map(|i| pdf(&d, 1.0 + i as f64 * 0.005) * 0.005).sum();
        let left: f64 = (0..1000).map(|i| pdf(&d, -1.0 - i as f64 * 0.005) * 0.005).sum();
        assert!(right > left);
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(SkewedGed::new(0.0, 2.0).is_none());
        assert!(SkewedGed::new(1.0, -1.0).is_none());
        assert!(SkewedGed::new(f64::NAN, 2.0).is_none());
    }
}
