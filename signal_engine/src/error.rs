//! error.rs - Error types for the signal engine
//!
//! `EngineError` is fatal and aborts a run before the window loop starts
//! (bad input, bad config, I/O).  `FitError` / `FitWarning` describe a
//! single estimator call; they are always recovered inside the loop.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("input series error: {0}")]
    Input(String),

    #[error("series has {len} returns, need at least {needed} for one window")]
    InsufficientData { len: usize, needed: usize },

    #[error("dates out of order at {prev} -> {next}")]
    UnsortedDates { prev: NaiveDate, next: NaiveDate },

    #[error("non-positive or non-finite price {price} on {date}")]
    BadPrice { date: NaiveDate, price: f64 },

    #[error("data frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Hard failure of a single estimator call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("window of {len} points too short for {params} parameters")]
    TooShort { len: usize, params: usize },

    #[error("window has (near) zero variance")]
    Degenerate,

    #[error("objective not finite at starting values")]
    NonFiniteStart,

    #[error("estimation produced non-finite {0}")]
    NonFinite(&'static str),
}

/// Soft failure: the estimator returned parameters but flagged them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitWarning {
    #[error("optimiser stopped after {iterations} iterations without converging")]
    NotConverged { iterations: usize },

    #[error("{0} coefficients at the stationarity/invertibility boundary")]
    UnitRoot(&'static str),

    #[error("GARCH persistence {0:.5} at the stationarity boundary")]
    Persistence(f64),

    #[error("distribution {name} = {value:.4} at its bound")]
    ParameterAtBound { name: &'static str, value: f64 },
}
