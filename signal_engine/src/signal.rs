//! signal.rs - Rolling-window signal generator
//!
//! ─────────────────────────────────────────────────────────────────────────
//! WINDOW LOOP
//! ─────────────────────────────────────────────────────────────────────────
//!
//!   fore_length = len(returns) − window_length
//!   for d in 0..=fore_length:
//!       window  = returns[d .. d + window_length]
//!       order   = AIC search over the grid          (search.rs)
//!       fcst    = ARMA(order)-GARCH(1,1) one step   (forecast.rs)
//!       signal  = −1 if fcst.mean < 0 else +1;  +1 on any failure
//!       date    = returns.date[d + window_length]   (the forecast day)
//!
//! The last offset forecasts the day after the series ends; it has no date
//! in the series and is returned as `SignalRun::pending` instead of a
//! record.  Windows are refit from scratch, so they are independent; the
//! parallel path still sorts results by offset before building records.
//! ─────────────────────────────────────────────────────────────────────────

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::ReturnSeries;
use crate::error::EngineError;
use crate::forecast::{forecast_window, VolatilityFitter};
use crate::models::garch::OneStepForecast;
use crate::models::ArmaOrder;
use crate::search::{par_search_order, search_order, MeanModelFitter, OrderGrid, SearchOutcome};

/// Trading direction. No other value is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Short,
    Long,
}

/// Signal used whenever a window cannot produce a clean forecast.
pub const FALLBACK_SIGNAL: Signal = Signal::Long;

impl Signal {
    pub fn from_forecast(mean: f64) -> Self {
        if mean < 0.0 {
            Signal::Short
        } else {
            Signal::Long
        }
    }

    pub fn value(self) -> i8 {
        match self {
            Signal::Short => -1,
            Signal::Long => 1,
        }
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.value())
    }
}

impl From<Signal> for i8 {
    fn from(s: Signal) -> i8 {
        s.value()
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(Signal::Short),
            1 => Ok(Signal::Long),
            other => Err(format!("signal must be -1 or 1, got {other}")),
        }
    }
}

impl TryFrom<i64> for Signal {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        i8::try_from(v).map_err(|e| e.to_string()).and_then(Signal::try_from)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// (forecast date, signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    pub signal: Signal,
}

/// What to do when no candidate order fits a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoModelPolicy {
    /// Fit the GARCH model with an intercept-only mean.
    DefaultOrder,
    /// Skip the GARCH fit and emit the fallback signal.
    SkipWindow,
}

impl FromStr for NoModelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default_order" | "default" => Ok(NoModelPolicy::DefaultOrder),
            "skip_window" | "skip" => Ok(NoModelPolicy::SkipWindow),
            other => Err(format!("unknown no-model policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub window_length: usize,
    pub grid: OrderGrid,
    pub no_model_policy: NoModelPolicy,
    /// Also forecast the day after the last observation.
    pub forecast_next: bool,
    /// Dispatch windows on the rayon pool.
    pub parallel: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            window_length: 500,
            grid: OrderGrid::default(),
            no_model_policy: NoModelPolicy::DefaultOrder,
            forecast_next: true,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    NoModelFound,
    VolatilityFitFailed,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::NoModelFound => write!(f, "no_model_found"),
            DiagnosticKind::VolatilityFitFailed => write!(f, "volatility_fit_failed"),
        }
    }
}

/// A recovered failure, tied to the window it happened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDiagnostic {
    pub offset: usize,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub kind: DiagnosticKind,
    pub detail: String,
}

/// Everything one window produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub offset: usize,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Day being forecast; `None` past the end of the series.
    pub target: Option<NaiveDate>,
    pub search: SearchOutcome,
    /// Mean order the GARCH model was fitted with, if it was fitted.
    pub order_used: Option<ArmaOrder>,
    pub forecast: Option<OneStepForecast>,
    pub signal: Signal,
    pub diagnostics: Vec<WindowDiagnostic>,
}

impl WindowResult {
    pub fn is_fallback(&self) -> bool {
        self.forecast.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub windows: usize,
    pub forecasts: usize,
    pub fallbacks: usize,
    pub no_model: usize,
    pub long: usize,
    pub short: usize,
}

/// Output of a full pass, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRun {
    /// Dated records, strictly increasing dates.
    pub records: Vec<ForecastRecord>,
    pub diagnostics: Vec<WindowDiagnostic>,
    /// Forecast for the day after the last observation.
    pub pending: Option<WindowResult>,
    pub stats: RunStats,
}

pub struct SignalGenerator<M, V> {
    mean_fitter: M,
    vol_fitter: V,
    config: GeneratorConfig,
}

impl<M: MeanModelFitter, V: VolatilityFitter> SignalGenerator<M, V> {
    pub fn new(mean_fitter: M, vol_fitter: V, config: GeneratorConfig) -> Self {
        Self { mean_fitter, vol_fitter, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Search, fit and map one window.  Caller guarantees
    /// `offset + window_length <= series.len()`.
    pub fn evaluate_window(&self, series: &ReturnSeries, offset: usize) -> WindowResult {
        let wl = self.config.window_length;
        let window = series.window(offset, wl);
        let dates = series.dates();
        let window_start = dates[offset];
        let window_end = dates[offset + wl - 1];
        let target = series.date(offset + wl);

        let mut diagnostics = Vec::new();
        let search = if self.config.parallel {
            par_search_order(&self.mean_fitter, window, &self.config.grid)
        } else {
            search_order(&self.mean_fitter, window, &self.config.grid)
        };

        let order_used = match (&search, self.config.no_model_policy) {
            (SearchOutcome::Selected { order, .. }, _) => Some(*order),
            (SearchOutcome::NoModelFound { attempts }, policy) => {
                warn!(
                    "window {} [{} .. {}]: no ARMA order fitted ({} attempts)",
                    offset, window_start, window_end, attempts
                );
                diagnostics.push(WindowDiagnostic {
                    offset,
                    window_start,
                    window_end,
                    kind: DiagnosticKind::NoModelFound,
                    detail: format!("all {attempts} candidate orders failed"),
                });
                match policy {
                    NoModelPolicy::DefaultOrder => Some(ArmaOrder::WHITE_NOISE),
                    NoModelPolicy::SkipWindow => None,
                }
            }
        };

        let forecast = order_used.and_then(|order| match forecast_window(&self.vol_fitter, window, order) {
            Ok(f) => Some(f),
            Err(failure) => {
                warn!(
                    "window {} [{} .. {}]: {} fit failed ({}), signal defaults to {}",
                    offset, window_start, window_end, order, failure, FALLBACK_SIGNAL
                );
                diagnostics.push(WindowDiagnostic {
                    offset,
                    window_start,
                    window_end,
                    kind: DiagnosticKind::VolatilityFitFailed,
                    detail: format!("{order}: {failure}"),
                });
                None
            }
        });

        let signal = forecast.map_or(FALLBACK_SIGNAL, |f| Signal::from_forecast(f.mean));
        debug!(
            "window {} -> {:?}: order={:?} mean={:?} signal={}",
            offset,
            target,
            order_used,
            forecast.map(|f| f.mean),
            signal
        );

        WindowResult {
            offset,
            window_start,
            window_end,
            target,
            search,
            order_used,
            forecast,
            signal,
            diagnostics,
        }
    }

    /// Drive the whole series.  Only an input too short for a single
    /// window is an error; every per-window failure is recovered.
    pub fn run(&self, series: &ReturnSeries) -> Result<SignalRun, EngineError> {
        let wl = self.config.window_length;
        if wl == 0 {
            return Err(EngineError::Config("window length must be positive".into()));
        }
        if series.len() < wl {
            return Err(EngineError::InsufficientData { len: series.len(), needed: wl });
        }
        let fore_length = series.len() - wl;
        let last = if self.config.forecast_next { fore_length + 1 } else { fore_length };

        info!(
            "Generating signals: {} returns, window={}, {} windows, grid {}x{}, parallel={}",
            series.len(),
            wl,
            last,
            self.config.grid.p_max,
            self.config.grid.q_max,
            self.config.parallel
        );

        let mut results: Vec<WindowResult> = if self.config.parallel {
            (0..last).into_par_iter().map(|d| self.evaluate_window(series, d)).collect()
        } else {
            (0..last).map(|d| self.evaluate_window(series, d)).collect()
        };
        results.sort_by_key(|r| r.offset);

        let run = assemble(results);
        info!(
            "Signals done: {} records, {} long / {} short, {} fallbacks, {} without model",
            run.records.len(),
            run.stats.long,
            run.stats.short,
            run.stats.fallbacks,
            run.stats.no_model
        );
        Ok(run)
    }
}

fn assemble(results: Vec<WindowResult>) -> SignalRun {
    let mut records = Vec::with_capacity(results.len());
    let mut diagnostics = Vec::new();
    let mut pending = None;
    let mut stats = RunStats::default();

    for r in results {
        stats.windows += 1;
        if r.is_fallback() {
            stats.fallbacks += 1;
        } else {
            stats.forecasts += 1;
        }
        if matches!(r.search, SearchOutcome::NoModelFound { .. }) {
            stats.no_model += 1;
        }
        match r.signal {
            Signal::Long => stats.long += 1,
            Signal::Short => stats.short += 1,
        }
        diagnostics.extend(r.diagnostics.iter().cloned());
        match r.target {
            Some(date) => records.push(ForecastRecord { date, signal: r.signal }),
            None => pending = Some(r),
        }
    }

    SignalRun { records, diagnostics, pending, stats }
}

/// Shift signals by one record: the signal applied on day t is the one
/// forecast for day t−1.  The first day gets `first`.
pub fn lag_signals(records: &[ForecastRecord], first: Signal) -> Vec<ForecastRecord> {
    let mut prev = first;
    records
        .iter()
        .map(|r| {
            let lagged = ForecastRecord { date: r.date, signal: prev };
            prev = r.signal;
            lagged
        })
        .collect()
}
