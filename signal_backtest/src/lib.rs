//! lib.rs - Signal backtest library
//!
//! Evaluation of daily long/short signals produced by `signal_engine`:
//! a vectorised signal × return comparison against buy-and-hold and an
//! order-driven simulation on daily closes.

pub mod evaluation;
pub mod metrics;
pub mod orders;
pub mod reporting;

pub use evaluation::{evaluate, join_signals, AlignedDay, EvaluationReport};
pub use metrics::PerfReport;
pub use orders::{OrderConfig, OrderSimulator};
