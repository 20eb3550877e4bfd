//! evaluation.rs - Signal vs buy-and-hold over aligned dates
//!
//! The signal file and the return series are inner-joined on date; only
//! days present in both survive.  On each surviving day
//!
//!   strategy_return = signal × market_return      (log returns)
//!
//! and both streams are accumulated into log-return curves.

use anyhow::{bail, Result};
use ahash::AHashMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use signal_engine::data::ReturnSeries;
use signal_engine::signal::{ForecastRecord, Signal};

use crate::metrics::{compute_metrics, PerfReport};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedDay {
    pub date: NaiveDate,
    pub signal: Signal,
    pub market_return: f64,
    pub strategy_return: f64,
}

/// Inner join on date, in signal order.
pub fn join_signals(signals: &[ForecastRecord], returns: &ReturnSeries) -> Vec<AlignedDay> {
    let by_date: AHashMap<NaiveDate, f64> = returns.iter().collect();
    let days: Vec<AlignedDay> = signals
        .iter()
        .filter_map(|rec| {
            by_date.get(&rec.date).map(|&r| AlignedDay {
                date: rec.date,
                signal: rec.signal,
                market_return: r,
                strategy_return: rec.signal.as_f64() * r,
            })
        })
        .collect();
    debug!(
        "join: {} signals × {} returns → {} aligned days",
        signals.len(),
        returns.len(),
        days.len()
    );
    days
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub date: NaiveDate,
    /// Cumulative log return of the strategy.
    pub strategy: f64,
    /// Cumulative log return of buy-and-hold.
    pub benchmark: f64,
}

impl CurvePoint {
    pub fn excess(&self) -> f64 {
        self.strategy - self.benchmark
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub strategy: PerfReport,
    pub benchmark: PerfReport,
    /// Strategy minus benchmark cumulative log return at the last date.
    pub excess_log_return: f64,
    pub curve: Vec<CurvePoint>,
}

pub fn cumulative_curves(days: &[AlignedDay]) -> Vec<CurvePoint> {
    let mut strategy = 0.0;
    let mut benchmark = 0.0;
    days.iter()
        .map(|d| {
            strategy += d.strategy_return;
            benchmark += d.market_return;
            CurvePoint { date: d.date, strategy, benchmark }
        })
        .collect()
}

/// Score aligned days against buy-and-hold.
pub fn evaluate(days: &[AlignedDay], periods_per_year: f64) -> Result<EvaluationReport> {
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        bail!("no dates in common between signals and returns");
    };

    let strat: Vec<f64> = days.iter().map(|d| d.strategy_return).collect();
    let market: Vec<f64> = days.iter().map(|d| d.market_return).collect();
    let exposure: Vec<i8> = days.iter().map(|d| d.signal.value()).collect();

    let strategy = compute_metrics(&strat, &exposure, periods_per_year);
    let benchmark = compute_metrics(&market, &vec![1; days.len()], periods_per_year);
    let curve = cumulative_curves(days);
    let excess_log_return = curve.last().map_or(0.0, CurvePoint::excess);

    info!(
        "Evaluated {} days ({} → {}): strategy {:.2}% vs buy-and-hold {:.2}%",
        days.len(),
        first.date,
        last.date,
        strategy.total_return * 100.0,
        benchmark.total_return * 100.0
    );

    Ok(EvaluationReport {
        first_date: first.date,
        last_date: last.date,
        strategy,
        benchmark,
        excess_log_return,
        curve,
    })
}
