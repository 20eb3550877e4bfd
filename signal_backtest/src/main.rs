//! main.rs - Backtest Runner
//!
//! Scores a signal file produced by `generate_signals` against the price
//! history it was built from:
//!   evaluate  signal × return vs buy-and-hold on the aligned dates
//!   orders    stop-limit entries / market exits simulated on closes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use signal_backtest::evaluation::{evaluate, join_signals};
use signal_backtest::metrics::TRADING_DAYS_PER_YEAR;
use signal_backtest::orders::{join_prices, OrderConfig, OrderSimulator};
use signal_backtest::reporting::{evaluation_text, orders_text, ReportConfig, ReportGenerator};
use signal_engine::artifacts::{read_signals, LAGGED_COLUMN};
use signal_engine::data::{load_prices, PricePoint, ReturnSeries};
use signal_engine::signal::ForecastRecord;

#[derive(Parser)]
#[command(name = "backtest")]
#[command(about = "Backtest daily long/short signals against a price history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Signal CSV (`date,<column>`)
    #[arg(short, long, default_value = "output/forecasts_lagged.csv")]
    pub signals: PathBuf,

    /// Signal column name
    #[arg(long, default_value = LAGGED_COLUMN)]
    pub column: String,

    /// Price CSV
    #[arg(short, long)]
    pub prices: PathBuf,

    #[arg(long, default_value = "date")]
    pub date_column: String,

    #[arg(long, default_value = "close")]
    pub price_column: String,

    /// Label used in report names
    #[arg(long, default_value = "^GSPC")]
    pub symbol: String,

    /// Output directory for reports
    #[arg(short, long, default_value = "./reports")]
    pub output_dir: PathBuf,

    /// Skip JSON export
    #[arg(long)]
    pub no_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Signal × return against buy-and-hold
    Evaluate {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, default_value_t = TRADING_DAYS_PER_YEAR)]
        periods_per_year: f64,
    },
    /// Order-driven simulation
    Orders {
        #[command(flatten)]
        input: InputArgs,

        /// Initial capital
        #[arg(short, long, default_value = "100000")]
        initial_capital: f64,

        #[arg(long, default_value = "0.5")]
        entry_threshold: f64,

        #[arg(long, default_value = "0")]
        stop_offset_bps: f64,

        #[arg(long, default_value = "50")]
        limit_band_bps: f64,

        /// Position notional cap as a fraction of equity
        #[arg(long, default_value = "1.0")]
        max_position: f64,

        #[arg(long, default_value = "0.001")]
        commission_rate: f64,

        #[arg(long, default_value = "5")]
        slippage_bps: f64,
    },
}

fn load_inputs(input: &InputArgs) -> Result<(Vec<ForecastRecord>, Vec<PricePoint>)> {
    let signals = read_signals(&input.signals, &input.column)
        .with_context(|| format!("reading signals from {}", input.signals.display()))?;
    let prices = load_prices(&input.prices, &input.date_column, &input.price_column)
        .with_context(|| format!("reading prices from {}", input.prices.display()))?;
    info!("Loaded {} signals and {} prices", signals.len(), prices.len());
    Ok((signals, prices))
}

fn reports(input: &InputArgs) -> ReportGenerator {
    ReportGenerator::new(ReportConfig {
        export_json: !input.no_json,
        export_csv: true,
        output_dir: input.output_dir.clone(),
    })
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Evaluate { input, periods_per_year } => {
            let (signals, prices) = load_inputs(&input)?;
            let returns = ReturnSeries::from_prices(&prices)?;
            let days = join_signals(&signals, &returns);
            let report = evaluate(&days, periods_per_year)?;
            reports(&input).export_evaluation(&report, &input.symbol)?;
            println!("\n{}", evaluation_text(&report, &input.symbol));
        }
        Commands::Orders {
            input,
            initial_capital,
            entry_threshold,
            stop_offset_bps,
            limit_band_bps,
            max_position,
            commission_rate,
            slippage_bps,
        } => {
            let config = OrderConfig {
                entry_threshold,
                stop_offset_bps,
                limit_band_bps,
                max_position,
                initial_capital,
                commission_rate,
                slippage_bps,
            };
            config.validate().context("invalid order settings")?;
            let (signals, prices) = load_inputs(&input)?;
            let days = join_prices(&signals, &prices);
            let report = OrderSimulator::new(config).run(&days)?;
            reports(&input).export_orders(&report, &input.symbol)?;
            println!("\n{}", orders_text(&report, &input.symbol));
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_evaluate() {
        let args = vec!["backtest", "evaluate", "--prices", "data/GSPC.csv"];
        let cli = Cli::try_parse_from(args).unwrap();
        if let Commands::Evaluate { input, periods_per_year } = cli.command {
            assert_eq!(input.prices, PathBuf::from("data/GSPC.csv"));
            assert_eq!(input.signals, PathBuf::from("output/forecasts_lagged.csv"));
            assert_eq!(input.column, "lagged_signal");
            assert_eq!(periods_per_year, 252.0);
        } else {
            panic!("Expected Evaluate command");
        }
    }

    #[test]
    fn test_cli_parsing_orders() {
        let args = vec![
            "backtest",
            "orders",
            "--prices", "p.csv",
            "--signals", "s.csv",
            "--column", "signal",
            "--initial-capital", "5000",
            "--limit-band-bps", "25",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        if let Commands::Orders { input, initial_capital, limit_band_bps, slippage_bps, .. } = cli.command {
            assert_eq!(input.column, "signal");
            assert_eq!(initial_capital, 5000.0);
            assert_eq!(limit_band_bps, 25.0);
            assert_eq!(slippage_bps, 5.0);
        } else {
            panic!("Expected Orders command");
        }
    }

    #[test]
    fn prices_are_required() {
        assert!(Cli::try_parse_from(vec!["backtest", "evaluate"]).is_err());
    }
}
