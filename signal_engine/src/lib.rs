pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod models;
pub mod search;
pub mod signal;

pub use error::{EngineError, FitError, FitWarning};
pub use models::{ArmaOrder, FitOutcome};
pub use signal::{ForecastRecord, Signal, SignalGenerator, SignalRun};
