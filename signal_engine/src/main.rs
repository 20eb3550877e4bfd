//! main.rs - Signal Generation Entry Point
//!
//! Runs one full pass over a price history:
//!   1. Load config from .env
//!   2. Load prices from CSV and take log returns
//!   3. Rolling window: ARMA order search + ARMA-GARCH(1,1) forecast
//!   4. Write forecasts, lagged forecasts and diagnostics

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use signal_engine::artifacts::write_run;
use signal_engine::config::AppConfig;
use signal_engine::data::{load_prices, ReturnSeries};
use signal_engine::models::arma::ArmaEstimator;
use signal_engine::signal::SignalGenerator;

fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════╗");
    info!("║      SIGNAL ENGINE  —  GENERATE MODE        ║");
    info!("║  ARMA(p,q) search + GARCH(1,1) SGED         ║");
    info!("╚══════════════════════════════════════════════╝");

    // ── Config ───────────────────────────────────────────────────────────
    let cfg = AppConfig::from_env()?;
    info!(
        "Config: symbol={} file={} columns=({}, {})",
        cfg.symbol, cfg.price_file.display(), cfg.date_column, cfg.price_column
    );
    info!(
        "Window: length={} grid=({}, {}) policy={:?} next_day={} parallel={}",
        cfg.window_length, cfg.p_max, cfg.q_max,
        cfg.no_model_policy, cfg.forecast_next, cfg.parallel
    );

    // ── Load Data ────────────────────────────────────────────────────────
    let prices = load_prices(&cfg.price_file, &cfg.date_column, &cfg.price_column)
        .with_context(|| format!("loading {}", cfg.price_file.display()))?;
    let returns = ReturnSeries::from_prices(&prices)?;
    if let (Some(first), Some(last)) = (returns.dates().first(), returns.dates().last()) {
        info!("Loaded {} returns  ({} → {})", returns.len(), first, last);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let mean = ArmaEstimator::new(cfg.mean_optim());
    let volatility = cfg.volatility_estimator();
    let generator = SignalGenerator::new(mean, volatility, cfg.generator());
    let run = generator.run(&returns)?;

    // ── Artifacts ────────────────────────────────────────────────────────
    let paths = write_run(&cfg.output_dir, &run, cfg.lag_default()?)?;
    info!("forecasts: {}", paths.forecasts.display());
    info!("lagged:    {}", paths.lagged.display());
    if !run.diagnostics.is_empty() {
        warn!("{} windows recovered from failures, see {}", run.diagnostics.len(), paths.diagnostics.display());
    }

    if let Some(next) = &run.pending {
        info!(
            "Next session after {}: signal {} (order {:?})",
            next.window_end, next.signal, next.order_used
        );
    }

    println!("\n{}", serde_json::to_string_pretty(&run.stats)?);
    Ok(())
}
