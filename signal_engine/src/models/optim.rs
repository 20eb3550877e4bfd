//! models/optim.rs - Nelder-Mead simplex minimiser
//!
//! ─────────────────────────────────────────────────────────────────────────
//! ALGORITHM
//! ─────────────────────────────────────────────────────────────────────────
//!
//!   Simplex of n+1 vertices around x₀ (step `initial_step` per axis).
//!   Each iteration, with vertices sorted f(x₁) ≤ … ≤ f(x_{n+1}) and
//!   centroid x̄ of the best n:
//!
//! ```text
//! reflect   x_r = x̄ + α(x̄ − x_{n+1})            α = 1
//! expand    x_e = x̄ + γ(x_r − x̄)                γ = 2
//! contract  x_c = x̄ + ρ(x_{n+1} − x̄)            ρ = 0.5
//! shrink    x_i = x₁ + σ(x_i − x₁)               σ = 0.5
//! ```
//!
//!   Stop when |f(x_{n+1}) − f(x₁)| ≤ tol · (|f(x₁)| + tol)
//!   or after `max_iter` iterations (reported as not converged).
//!
//!   Non-finite objective values are treated as +∞ so the simplex walks
//!   away from infeasible regions.
//! ─────────────────────────────────────────────────────────────────────────

use ndarray::Array1;

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self { max_iter: 4_000, tolerance: 1e-8, initial_step: 0.1 }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Array1<f64>,
    pub fval: f64,
    pub iterations: usize,
    pub converged: bool,
}

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Minimise `f` starting from `x0`.
///
/// Returns `None` if the objective is not finite at `x0`.
pub fn minimize<F>(f: F, x0: &[f64], cfg: &NelderMeadConfig) -> Option<Minimum>
where
    F: Fn(&Array1<f64>) -> f64,
{
    let n = x0.len();
    let eval = |x: &Array1<f64>| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let start = Array1::from(x0.to_vec());
    let f0 = eval(&start);
    if !f0.is_finite() {
        return None;
    }
    if n == 0 {
        return Some(Minimum { x: start, fval: f0, iterations: 0, converged: true });
    }

    let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.clone(), f0));
    for i in 0..n {
        let mut v = start.clone();
        let step = if v[i].abs() > 1e-8 { cfg.initial_step * v[i].abs().max(1.0) } else { cfg.initial_step };
        v[i] += step;
        let fv = eval(&v);
        simplex.push((v, fv));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < cfg.max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() <= cfg.tolerance * (best.abs() + cfg.tolerance) {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = Array1::<f64>::zeros(n);
        for (v, _) in simplex.iter().take(n) {
            centroid += v;
        }
        centroid /= n as f64;

        let worst_x = simplex[n].0.clone();
        let reflected = &centroid + &((&centroid - &worst_x) * ALPHA);
        let f_r = eval(&reflected);

        if f_r < simplex[0].1 {
            let expanded = &centroid + &((&reflected - &centroid) * GAMMA);
            let f_e = eval(&expanded);
            simplex[n] = if f_e < f_r { (expanded, f_e) } else { (reflected, f_r) };
            continue;
        }
        if f_r < simplex[n - 1].1 {
            simplex[n] = (reflected, f_r);
            continue;
        }

        // Outside contraction if the reflection beat the worst, inside otherwise.
        let (contracted, f_c) = if f_r < worst {
            let c = &centroid + &((&reflected - &centroid) * RHO);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = &centroid + &((&worst_x - &centroid) * RHO);
            let fc = eval(&c);
            (c, fc)
        };
        if f_c < worst.min(f_r) {
            simplex[n] = (contracted, f_c);
            continue;
        }

        let best_x = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = &best_x + &((&vertex.0 - &best_x) * SIGMA);
            let fs = eval(&shrunk);
            *vertex = (shrunk, fs);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, fval) = simplex.swap_remove(0);
    Some(Minimum { x, fval, iterations, converged })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_quadratic_minimum() {
        let f = |x: &Array1<f64>| (x[0] - 1.5).powi(2) + 2.0 * (x[1] + 0.5).powi(2) + 3.0;
        let m = minimize(f, &[0.0, 0.0], &NelderMeadConfig::default()).expect("finite start");
        assert!(m.converged);
        assert!((m.x[0] - 1.5).abs() < 1e-3, "x0 = {}", m.x[0]);
        assert!((m.x[1] + 0.5).abs() < 1e-3, "x1 = {}", m.x[1]);
        assert!((m.fval - 3.0).abs() < 1e-6);
    }

    #[test]
    fn rosenbrock_converges() {
        let f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let cfg = NelderMeadConfig { max_iter: 10_000, tolerance: 1e-14, initial_step: 0.5 };
        let m = minimize(f, &[-1.2, 1.0], &cfg).expect("finite start");
        assert!((m.x[0] - 1.0).abs() < 1e-2);
        assert!((m.x[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn iteration_cap_reports_not_converged() {
        let f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let cfg = NelderMeadConfig { max_iter: 3, tolerance: 1e-14, initial_step: 0.5 };
        let m = minimize(f, &[-1.2, 1.0], &cfg).expect("finite start");
        assert!(!m.converged);
        assert_eq!(m.iterations, 3);
    }

    #[test]
    fn non_finite_start_is_rejected() {
        let f = |_: &Array1<f64>| f64::NAN;
        assert!(minimize(f, &[0.0], &NelderMeadConfig::default()).is_none());
    }
}
