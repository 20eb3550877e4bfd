//! reporting.rs - Backtest report output
//!
//! Text summaries for the console, plus file exports:
//! - JSON of the full report (`serde_json`)
//! - CSV of the cumulative curves or the equity curve
//! - CSV trade log for the order-driven run

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::evaluation::EvaluationReport;
use crate::orders::{OrderRunReport, Side};

/// Report generator configuration
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Export to JSON
    pub export_json: bool,
    /// Export curves / trades to CSV
    pub export_csv: bool,
    /// Output directory
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            export_json: true,
            export_csv: true,
            output_dir: PathBuf::from("./reports"),
        }
    }
}

pub fn evaluation_text(report: &EvaluationReport, symbol: &str) -> String {
    let mut out = String::new();
    let _ = write_evaluation(&mut out, report, symbol);
    out
}

fn write_evaluation(f: &mut String, report: &EvaluationReport, symbol: &str) -> std::fmt::Result {
    use std::fmt::Write;
    writeln!(f, "════════════════════════════════════════════")?;
    writeln!(f, "  SIGNAL EVALUATION  {symbol}")?;
    writeln!(f, "  {} → {}", report.first_date, report.last_date)?;
    writeln!(f, "════════════════════════════════════════════")?;
    report.strategy.write_block(f, "STRATEGY (signal × return)")?;
    report.benchmark.write_block(f, "BUY AND HOLD")?;
    writeln!(f, "  ── EXCESS ──")?;
    writeln!(f, "  Log Return     : {:+.4}", report.excess_log_return)?;
    writeln!(f, "════════════════════════════════════════════")
}

pub fn orders_text(report: &OrderRunReport, symbol: &str) -> String {
    let mut out = String::new();
    let _ = write_orders(&mut out, report, symbol);
    out
}

fn write_orders(f: &mut String, report: &OrderRunReport, symbol: &str) -> std::fmt::Result {
    use std::fmt::Write;
    writeln!(f, "════════════════════════════════════════════")?;
    writeln!(f, "  ORDER-DRIVEN BACKTEST  {symbol}")?;
    writeln!(f, "════════════════════════════════════════════")?;
    writeln!(f, "  Initial Capital: ${:.2}", report.config.initial_capital)?;
    writeln!(f, "  Final Capital  : ${:.2}", report.final_equity)?;
    writeln!(f, "  Orders         : {} submitted, {} entries filled, {} expired",
        report.orders_submitted, report.entries_filled, report.entries_expired)?;
    report.performance.write_block(f, "EQUITY CURVE")?;

    writeln!(f, "  ── TRADES ──")?;
    writeln!(f, "  Total Trades   : {}", report.trades.len())?;
    if !report.trades.is_empty() {
        let wins = report.trades.iter().filter(|t| t.pnl > 0.0).count();
        writeln!(f, "  Win Rate       : {:.1}%", wins as f64 / report.trades.len() as f64 * 100.0)?;
        let best = report.trades.iter().map(|t| t.pnl).fold(f64::NEG_INFINITY, f64::max);
        let worst = report.trades.iter().map(|t| t.pnl).fold(f64::INFINITY, f64::min);
        writeln!(f, "  Best Trade     : ${best:.2}")?;
        writeln!(f, "  Worst Trade    : ${worst:.2}")?;
    }
    writeln!(f, "════════════════════════════════════════════")
}

pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    fn base_name(kind: &str, symbol: &str) -> String {
        let clean: String = symbol.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        format!("{kind}_{clean}_{}", Utc::now().format("%Y%m%d_%H%M%S"))
    }

    /// Write text, JSON and curve CSV for a signal evaluation.
    pub fn export_evaluation(&self, report: &EvaluationReport, symbol: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.config.output_dir)?;
        let base = Self::base_name("evaluation", symbol);
        let mut written = vec![self.write_text(&base, &evaluation_text(report, symbol))?];

        if self.config.export_json {
            written.push(self.write_json(&base, report)?);
        }
        if self.config.export_csv {
            let mut df = df!(
                "date" => report.curve.iter().map(|p| p.date.to_string()).collect::<Vec<_>>(),
                "strategy_cum_log" => report.curve.iter().map(|p| p.strategy).collect::<Vec<_>>(),
                "benchmark_cum_log" => report.curve.iter().map(|p| p.benchmark).collect::<Vec<_>>(),
                "excess_cum_log" => report.curve.iter().map(|p| p.excess()).collect::<Vec<_>>(),
            )?;
            written.push(self.write_csv(&format!("{base}_curve.csv"), &mut df)?);
        }
        Ok(written)
    }

    /// Write text, JSON, equity CSV and trade log for an order-driven run.
    pub fn export_orders(&self, report: &OrderRunReport, symbol: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.config.output_dir)?;
        let base = Self::base_name("orders", symbol);
        let mut written = vec![self.write_text(&base, &orders_text(report, symbol))?];

        if self.config.export_json {
            written.push(self.write_json(&base, report)?);
        }
        if self.config.export_csv {
            let curve = &report.equity_curve;
            let mut equity_df = df!(
                "date" => curve.iter().map(|p| p.date.to_string()).collect::<Vec<_>>(),
                "equity" => curve.iter().map(|p| p.equity).collect::<Vec<_>>(),
                "exposure" => curve.iter().map(|p| i32::from(p.exposure)).collect::<Vec<_>>(),
                "drawdown" => curve.iter().map(|p| p.drawdown).collect::<Vec<_>>(),
            )?;
            written.push(self.write_csv(&format!("{base}_equity.csv"), &mut equity_df)?);

            let trades = &report.trades;
            let side = |s: Side| match s {
                Side::Long => "LONG",
                Side::Short => "SHORT",
            };
            let mut trades_df = df!(
                "id" => trades.iter().map(|t| t.id.to_string()).collect::<Vec<_>>(),
                "side" => trades.iter().map(|t| side(t.side)).collect::<Vec<_>>(),
                "entry_date" => trades.iter().map(|t| t.entry_date.to_string()).collect::<Vec<_>>(),
                "exit_date" => trades.iter().map(|t| t.exit_date.to_string()).collect::<Vec<_>>(),
                "entry_price" => trades.iter().map(|t| t.entry_price).collect::<Vec<_>>(),
                "exit_price" => trades.iter().map(|t| t.exit_price).collect::<Vec<_>>(),
                "quantity" => trades.iter().map(|t| t.quantity).collect::<Vec<_>>(),
                "pnl" => trades.iter().map(|t| t.pnl).collect::<Vec<_>>(),
                "commission" => trades.iter().map(|t| t.commission).collect::<Vec<_>>(),
                "return_pct" => trades.iter().map(|t| t.return_pct).collect::<Vec<_>>(),
            )?;
            written.push(self.write_csv(&format!("{base}_trades.csv"), &mut trades_df)?);
        }
        Ok(written)
    }

    fn write_text(&self, base: &str, text: &str) -> Result<PathBuf> {
        let path = self.config.output_dir.join(format!("{base}.txt"));
        fs::write(&path, text)?;
        info!("Report saved to: {}", path.display());
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, base: &str, report: &T) -> Result<PathBuf> {
        let path = self.config.output_dir.join(format!("{base}.json"));
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!("JSON report exported to: {}", path.display());
        Ok(path)
    }

    fn write_csv(&self, file_name: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.config.output_dir.join(file_name);
        let mut file = fs::File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        info!("CSV exported to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{evaluate, AlignedDay};
    use crate::orders::{MarketDay, OrderConfig, OrderSimulator};
    use chrono::NaiveDate;
    use signal_engine::Signal;

    fn d(i: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, i).unwrap()
    }

    fn sample_evaluation() -> EvaluationReport {
        let days: Vec<AlignedDay> = [(1, Signal::Long, 0.01), (2, Signal::Short, -0.02), (5, Signal::Long, 0.004)]
            .into_iter()
            .map(|(i, signal, r)| AlignedDay {
                date: d(i),
                signal,
                market_return: r,
                strategy_return: signal.as_f64() * r,
            })
            .collect();
        evaluate(&days, 252.0).unwrap()
    }

    #[test]
    fn test_report_config() {
        let config = ReportConfig::default();
        assert!(config.export_json);
        assert!(config.export_csv);
        assert_eq!(config.output_dir, PathBuf::from("./reports"));
    }

    #[test]
    fn evaluation_text_names_both_streams() {
        let text = evaluation_text(&sample_evaluation(), "^GSPC");
        assert!(text.contains("STRATEGY"));
        assert!(text.contains("BUY AND HOLD"));
        assert!(text.contains("2024-02-01 → 2024-02-05"));
    }

    #[test]
    fn exports_evaluation_files() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(ReportConfig { output_dir: dir.path().to_path_buf(), ..Default::default() });
        let written = generator.export_evaluation(&sample_evaluation(), "^GSPC").unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            assert!(path.exists(), "{}", path.display());
        }
        let csv = written.iter().find(|p| p.to_string_lossy().ends_with("_curve.csv")).unwrap();
        let text = fs::read_to_string(csv).unwrap();
        assert!(text.starts_with("date,strategy_cum_log,benchmark_cum_log,excess_cum_log"));
        assert_eq!(text.lines().count(), 4);

        let json = written.iter().find(|p| p.extension().is_some_and(|e| e == "json")).unwrap();
        let back: EvaluationReport = serde_json::from_str(&fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(back.curve.len(), 3);
    }

    #[test]
    fn exports_order_files_including_trade_log() {
        let days = vec![
            MarketDay { date: d(1), close: 100.0, signal: 1.0 },
            MarketDay { date: d(2), close: 100.2, signal: 1.0 },
            MarketDay { date: d(5), close: 101.0, signal: -1.0 },
        ];
        let report = OrderSimulator::new(OrderConfig::default()).run(&days).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(ReportConfig {
            export_json: false,
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let written = generator.export_orders(&report, "SPY").unwrap();
        assert_eq!(written.len(), 3);
        let trades = written.iter().find(|p| p.to_string_lossy().ends_with("_trades.csv")).unwrap();
        let text = fs::read_to_string(trades).unwrap();
        assert!(text.starts_with("id,side,entry_date"));
        assert!(text.lines().count() >= 2);
    }
}
