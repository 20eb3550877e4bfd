//! config.rs - Centralised configuration loaded from .env
//!
//! Every parameter of a signal run is defined here.  Loading happens once
//! at startup; the binary turns it into the generator and estimator configs.

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::garch::ArmaGarchEstimator;
use crate::models::optim::NelderMeadConfig;
use crate::search::OrderGrid;
use crate::signal::{GeneratorConfig, NoModelPolicy, Signal};

/// Smallest window the estimators are given; below this the 35-order grid
/// is mostly TooShort failures.
pub const MIN_WINDOW_LENGTH: usize = 30;
pub const MAX_GRID_ORDER: usize = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // ── Input ────────────────────────────────────────────────────────
    /// Label only; the prices themselves come from `price_file`.
    pub symbol:       String,
    pub price_file:   PathBuf,
    pub date_column:  String,
    pub price_column: String,

    // ── Rolling window & order search ────────────────────────────────
    pub window_length:   usize,
    pub p_max:           usize,
    pub q_max:           usize,
    pub no_model_policy: NoModelPolicy,
    pub forecast_next:   bool,
    pub parallel:        bool,

    // ── Optimisers ───────────────────────────────────────────────────
    /// ARMA mean fits (order search and GARCH warm start).
    pub optim_max_iter:  usize,
    pub optim_tolerance: f64,
    /// ARMA-GARCH likelihood fit.
    pub vol_optim_max_iter:  usize,
    pub vol_optim_tolerance: f64,

    // ── Output ───────────────────────────────────────────────────────
    /// Signal assumed before the first forecast when lagging.
    pub lag_default_signal: i8,
    pub output_dir:         PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol:       "^GSPC".into(),
            price_file:   PathBuf::from("data/GSPC.csv"),
            date_column:  "date".into(),
            price_column: "close".into(),

            window_length:   500,
            p_max:           5,
            q_max:           5,
            no_model_policy: NoModelPolicy::DefaultOrder,
            forecast_next:   true,
            parallel:        false,

            optim_max_iter:  4000,
            optim_tolerance: 1e-8,
            vol_optim_max_iter:  20_000,
            vol_optim_tolerance: 1e-9,

            lag_default_signal: 1,
            output_dir:         PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // ignore missing .env
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let cfg = Self {
            symbol:       lookup("SYMBOL").unwrap_or(d.symbol),
            price_file:   lookup("PRICE_FILE").map(PathBuf::from).unwrap_or(d.price_file),
            date_column:  lookup("DATE_COLUMN").unwrap_or(d.date_column),
            price_column: lookup("PRICE_COLUMN").unwrap_or(d.price_column),

            window_length:   parse_key(&lookup, "WINDOW_LENGTH", d.window_length)?,
            p_max:           parse_key(&lookup, "P_MAX", d.p_max)?,
            q_max:           parse_key(&lookup, "Q_MAX", d.q_max)?,
            no_model_policy: parse_key(&lookup, "NO_MODEL_POLICY", d.no_model_policy)?,
            forecast_next:   parse_key(&lookup, "FORECAST_NEXT", d.forecast_next)?,
            parallel:        parse_key(&lookup, "PARALLEL", d.parallel)?,

            optim_max_iter:  parse_key(&lookup, "OPTIM_MAX_ITER", d.optim_max_iter)?,
            optim_tolerance: parse_key(&lookup, "OPTIM_TOLERANCE", d.optim_tolerance)?,
            vol_optim_max_iter:  parse_key(&lookup, "VOL_OPTIM_MAX_ITER", d.vol_optim_max_iter)?,
            vol_optim_tolerance: parse_key(&lookup, "VOL_OPTIM_TOLERANCE", d.vol_optim_tolerance)?,

            lag_default_signal: parse_key(&lookup, "LAG_DEFAULT_SIGNAL", d.lag_default_signal)?,
            output_dir:         lookup("OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_length < MIN_WINDOW_LENGTH {
            bail!("WINDOW_LENGTH must be at least {MIN_WINDOW_LENGTH}, got {}", self.window_length);
        }
        if self.p_max > MAX_GRID_ORDER || self.q_max > MAX_GRID_ORDER {
            bail!("P_MAX/Q_MAX must not exceed {MAX_GRID_ORDER}, got {}/{}", self.p_max, self.q_max);
        }
        if self.p_max == 0 && self.q_max == 0 {
            bail!("P_MAX and Q_MAX are both 0: the order grid is empty");
        }
        if !(self.optim_tolerance > 0.0) || self.optim_max_iter == 0 {
            bail!("optimiser needs OPTIM_MAX_ITER > 0 and OPTIM_TOLERANCE > 0");
        }
        if !(self.vol_optim_tolerance > 0.0) || self.vol_optim_max_iter == 0 {
            bail!("optimiser needs VOL_OPTIM_MAX_ITER > 0 and VOL_OPTIM_TOLERANCE > 0");
        }
        self.lag_default()?;
        Ok(())
    }

    pub fn lag_default(&self) -> Result<Signal> {
        Signal::try_from(self.lag_default_signal)
            .map_err(|e| anyhow::anyhow!("Config key LAG_DEFAULT_SIGNAL: {e}"))
    }

    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig {
            window_length:   self.window_length,
            grid:            OrderGrid::new(self.p_max, self.q_max),
            no_model_policy: self.no_model_policy,
            forecast_next:   self.forecast_next,
            parallel:        self.parallel,
        }
    }

    /// Optimiser settings for the mean-model search.
    pub fn mean_optim(&self) -> NelderMeadConfig {
        NelderMeadConfig {
            max_iter:  self.optim_max_iter,
            tolerance: self.optim_tolerance,
            ..NelderMeadConfig::default()
        }
    }

    /// Optimiser settings for the ARMA-GARCH likelihood.
    pub fn volatility_optim(&self) -> NelderMeadConfig {
        NelderMeadConfig {
            max_iter:  self.vol_optim_max_iter,
            tolerance: self.vol_optim_tolerance,
            ..ArmaGarchEstimator::default().optim
        }
    }

    pub fn volatility_estimator(&self) -> ArmaGarchEstimator {
        ArmaGarchEstimator::new(self.volatility_optim(), self.mean_optim())
    }
}

fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Config key {key}: {e}")),
        None => Ok(default),
    }
}
