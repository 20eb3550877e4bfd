//! metrics.rs - Performance Metrics over daily log returns
//!
//! ─────────────────────────────────────────────────────────────────────────
//! DEFINITIONS   (r_t = daily log return, N = periods per year)
//! ─────────────────────────────────────────────────────────────────────────
//!
//! TOTAL RETURN
//!   log:    R = Σ r_t
//!   simple: exp(R) − 1
//!
//! ANNUALISED RETURN (CAGR) / VOLATILITY
//!   CAGR  = exp(R × N / T) − 1
//!   vol   = std(r) × √N
//!
//! SHARPE RATIO (annualised, r_f = 0)
//!   SR  = mean(r) / std(r) × √N
//!
//! SORTINO RATIO (annualised)
//!   σ_d = √(mean(min(r_t, 0)²))
//!   SoR = mean(r) / σ_d × √N
//!
//! MAXIMUM DRAWDOWN   on E_t = exp(Σ_{s≤t} r_s), E_0 = 1
//!   DD_t  = (E_t − max_{s≤t} E_s) / max_{s≤t} E_s
//!   MaxDD = min_t DD_t   (most negative)
//!
//! CALMAR RATIO
//!   Calmar = CAGR / |MaxDD|
//!
//! HIT RATE
//!   count(r_t > 0) / count(r_t ≠ 0)
//! ─────────────────────────────────────────────────────────────────────────
//!
//! Ratios with a zero denominator are reported as 0 so reports stay valid
//! JSON.

use serde::{Deserialize, Serialize};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Complete performance report for one return stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfReport {
    pub periods:               usize,
    pub total_log_return:      f64,
    pub total_return:          f64,  // fraction
    pub annualized_return:     f64,  // fraction (CAGR)
    pub annualized_volatility: f64,
    pub sharpe:                f64,
    pub sortino:               f64,
    pub max_drawdown:          f64,  // fraction (negative)
    pub calmar:                f64,
    pub hit_rate:              f64,
    pub long_periods:          usize,
    pub short_periods:         usize,
}

impl PerfReport {
    fn empty() -> Self {
        Self {
            periods: 0, total_log_return: 0.0, total_return: 0.0,
            annualized_return: 0.0, annualized_volatility: 0.0,
            sharpe: 0.0, sortino: 0.0, max_drawdown: 0.0, calmar: 0.0,
            hit_rate: 0.0, long_periods: 0, short_periods: 0,
        }
    }

    /// Write the report body under a `title` header.
    pub fn write_block(&self, f: &mut impl std::fmt::Write, title: &str) -> std::fmt::Result {
        writeln!(f, "  ── {title} ──")?;
        writeln!(f, "  Periods        : {}", self.periods)?;
        writeln!(f, "  Long / Short   : {} / {}", self.long_periods, self.short_periods)?;
        writeln!(f, "  Total Return   : {:.2}%  (log {:.4})", self.total_return * 100.0, self.total_log_return)?;
        writeln!(f, "  CAGR           : {:.2}%", self.annualized_return * 100.0)?;
        writeln!(f, "  Volatility     : {:.2}%", self.annualized_volatility * 100.0)?;
        writeln!(f, "  Sharpe Ratio   : {:.3}", self.sharpe)?;
        writeln!(f, "  Sortino Ratio  : {:.3}", self.sortino)?;
        writeln!(f, "  Max Drawdown   : {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "  Calmar Ratio   : {:.3}", self.calmar)?;
        writeln!(f, "  Hit Rate       : {:.2}%", self.hit_rate * 100.0)
    }
}

impl std::fmt::Display for PerfReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_block(f, "PERFORMANCE")
    }
}

/// Compute all metrics for a stream of log returns.
///
/// `exposure[t]` is the position sign held over period t (+1, −1, 0); it
/// only feeds the long/short counts and may be shorter than `log_returns`.
pub fn compute_metrics(log_returns: &[f64], exposure: &[i8], periods_per_year: f64) -> PerfReport {
    let n = log_returns.len();
    if n == 0 {
        return PerfReport::empty();
    }

    let total_log_return: f64 = log_returns.iter().sum();
    let total_return = total_log_return.exp() - 1.0;
    let annualized_return = (total_log_return * periods_per_year / n as f64).exp() - 1.0;

    // ── Sharpe Ratio ──────────────────────────────────────────────────────
    let r_mean = mean(log_returns).unwrap_or(0.0);
    let r_std = std_dev(log_returns);
    let annualized_volatility = r_std * periods_per_year.sqrt();
    let sharpe = ratio(r_mean, r_std) * periods_per_year.sqrt();

    // ── Sortino Ratio ─────────────────────────────────────────────────────
    let downside_sq: Vec<f64> = log_returns
        .iter()
        .map(|&r| if r < 0.0 { r * r } else { 0.0 })
        .collect();
    let sigma_d = mean(&downside_sq).unwrap_or(0.0).sqrt();
    let sortino = ratio(r_mean, sigma_d) * periods_per_year.sqrt();

    // ── Maximum Drawdown / Calmar ─────────────────────────────────────────
    let max_drawdown = max_drawdown(&equity_from_log_returns(log_returns, 1.0));
    let calmar = ratio(annualized_return, max_drawdown.abs());

    // ── Hit rate & exposure ───────────────────────────────────────────────
    let moved = log_returns.iter().filter(|&&r| r != 0.0).count();
    let wins = log_returns.iter().filter(|&&r| r > 0.0).count();
    let hit_rate = if moved == 0 { 0.0 } else { wins as f64 / moved as f64 };

    PerfReport {
        periods: n,
        total_log_return,
        total_return,
        annualized_return,
        annualized_volatility,
        sharpe,
        sortino,
        max_drawdown,
        calmar,
        hit_rate,
        long_periods: exposure.iter().filter(|&&e| e > 0).count(),
        short_periods: exposure.iter().filter(|&&e| e < 0).count(),
    }
}

/// E_t = start × exp(Σ r), with E_0 = start prepended.
pub fn equity_from_log_returns(log_returns: &[f64], start: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(log_returns.len() + 1);
    curve.push(start);
    let mut cum = 0.0;
    for r in log_returns {
        cum += r;
        curve.push(start * cum.exp());
    }
    curve
}

/// Log returns of consecutive equity values.  Non-positive values are
/// treated as ruin and stop the series.
pub fn log_returns_from_equity(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .take_while(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Maximum drawdown from an equity curve.
/// Returns a negative value (e.g. −0.15 = −15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0f64;

    for &e in equity_curve {
        if e > peak {
            peak = e;
        }
        let dd = (e - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

// ── Statistical helpers ───────────────────────────────────────────────────

fn ratio(num: f64, den: f64) -> f64 {
    if den < 1e-12 { 0.0 } else { num / den }
}

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = data.iter().sum::<f64>() / data.len() as f64;
    let var = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_drawdown_flat() {
        let curve = vec![100.0, 100.0, 100.0];
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn max_drawdown_50_pct() {
        let curve = vec![100.0, 120.0, 60.0, 80.0];
        // peak=120, low=60 → DD = (60−120)/120 = −0.5
        let dd = max_drawdown(&curve);
        assert!((dd + 0.5).abs() < 1e-9, "dd = {dd}");
    }

    #[test]
    fn totals_and_counts() {
        let r = [0.01, -0.02, 0.03, 0.0];
        let report = compute_metrics(&r, &[1, -1, 1, 1], TRADING_DAYS_PER_YEAR);
        assert_eq!(report.periods, 4);
        assert!((report.total_log_return - 0.02).abs() < 1e-12);
        assert!((report.total_return - (0.02f64.exp() - 1.0)).abs() < 1e-12);
        assert_eq!((report.long_periods, report.short_periods), (3, 1));
        assert!((report.hit_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!(report.max_drawdown < 0.0);
        assert!(report.sharpe > 0.0);
    }

    #[test]
    fn constant_returns_have_no_ratio_blowup() {
        let report = compute_metrics(&[0.001; 10], &[], TRADING_DAYS_PER_YEAR);
        assert_eq!(report.sharpe, 0.0);
        assert_eq!(report.sortino, 0.0);
        assert_eq!(report.calmar, 0.0);
        assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn equity_and_log_returns_are_inverse() {
        let r = vec![0.01, -0.005, 0.02];
        let eq = equity_from_log_returns(&r, 100.0);
        assert_eq!(eq.len(), 4);
        let back = log_returns_from_equity(&eq);
        for (a, b) in r.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_input_is_empty_report() {
        assert_eq!(compute_metrics(&[], &[], 252.0).periods, 0);
    }
}
