//! orders.rs - Order-driven variant of the signal backtest
//!
//! The daily signal is treated as an indicator value.  At the start of day t
//! the translator compares it to `entry_threshold` and, when the desired
//! side differs from the open position, emits
//!
//!   MarketExit      for the open position (if any)
//!   StopLimitEntry  stop  = P_{t−1} × (1 ± stop_offset)
//!                   limit = stop    × (1 ± limit_band)
//!
//! The simulator only knows daily closes, so every order is evaluated
//! against P_t: exits fill at the close, entries fill at the close when it
//! is through the stop and inside the limit, otherwise they expire.

use ahash::AHashMap;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use signal_engine::data::PricePoint;
use signal_engine::signal::ForecastRecord;

use crate::metrics::{compute_metrics, log_returns_from_equity, PerfReport, TRADING_DAYS_PER_YEAR};

const BPS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderConfig {
    /// |signal| needed to want a position.
    pub entry_threshold: f64,
    pub stop_offset_bps: f64,
    pub limit_band_bps: f64,
    /// Position notional cap as a fraction of equity.
    pub max_position: f64,
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_bps: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 0.5,
            stop_offset_bps: 0.0,
            limit_band_bps: 50.0,
            max_position: 1.0,
            initial_capital: 100_000.0,
            commission_rate: 0.001, // 0.1%
            slippage_bps: 5.0,
        }
    }
}

impl OrderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_capital > 0.0) || !self.initial_capital.is_finite() {
            bail!("initial capital must be positive, got {}", self.initial_capital);
        }
        if !(self.max_position > 0.0) || !self.max_position.is_finite() {
            bail!("max position must be positive, got {}", self.max_position);
        }
        let non_negative = [
            ("entry threshold", self.entry_threshold),
            ("stop offset", self.stop_offset_bps),
            ("limit band", self.limit_band_bps),
            ("commission rate", self.commission_rate),
            ("slippage", self.slippage_bps),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                bail!("{name} must be a finite non-negative number, got {value}");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderIntent {
    StopLimitEntry {
        id: Uuid,
        side: Side,
        quantity: f64,
        stop: f64,
        limit: f64,
    },
    MarketExit {
        id: Uuid,
        side: Side,
        quantity: f64,
    },
}

/// One trading day: close price and the signal to act on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketDay {
    pub date: NaiveDate,
    pub close: f64,
    pub signal: f64,
}

/// Inner join of signals and prices on date, in signal order.
pub fn join_prices(signals: &[ForecastRecord], prices: &[PricePoint]) -> Vec<MarketDay> {
    let by_date: AHashMap<NaiveDate, f64> = prices.iter().map(|p| (p.date, p.close)).collect();
    signals
        .iter()
        .filter_map(|rec| {
            by_date.get(&rec.date).map(|&close| MarketDay {
                date: rec.date,
                close,
                signal: rec.signal.as_f64(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Position {
    side: Side,
    quantity: f64,
    entry_price: f64,
    entry_date: NaiveDate,
    entry_commission: f64,
}

/// Thresholds signals into order intents.
#[derive(Debug, Clone, Copy)]
pub struct OrderTranslator {
    config: OrderConfig,
}

impl OrderTranslator {
    pub fn new(config: OrderConfig) -> Self {
        Self { config }
    }

    pub fn desired_side(&self, signal: f64) -> Option<Side> {
        if signal >= self.config.entry_threshold {
            Some(Side::Long)
        } else if signal <= -self.config.entry_threshold {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Intents for a day given the previous close, the open position and
    /// the equity available for sizing.
    pub fn translate(
        &self,
        signal: f64,
        reference_price: f64,
        open: Option<(Side, f64)>,
        equity: f64,
    ) -> Vec<OrderIntent> {
        let want = self.desired_side(signal);
        let have = open.map(|(side, _)| side);
        if want == have {
            return Vec::new();
        }

        let mut intents = Vec::with_capacity(2);
        if let Some((side, quantity)) = open {
            intents.push(OrderIntent::MarketExit { id: Uuid::new_v4(), side, quantity });
        }
        if let Some(side) = want {
            let stop = reference_price * (1.0 + side.sign() * self.config.stop_offset_bps / BPS);
            let limit = stop * (1.0 + side.sign() * self.config.limit_band_bps / BPS);
            let quantity = (equity * self.config.max_position / stop).max(0.0);
            if quantity > 0.0 {
                intents.push(OrderIntent::StopLimitEntry { id: Uuid::new_v4(), side, quantity, stop, limit });
            }
        }
        intents
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub side: Side,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub commission: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    /// Position sign held at the close (+1, −1, 0).
    pub exposure: i8,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRunReport {
    pub config: OrderConfig,
    pub orders_submitted: usize,
    pub entries_filled: usize,
    pub entries_expired: usize,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub performance: PerfReport,
}

/// Fills intents against daily closes and keeps the books.
pub struct OrderSimulator {
    config: OrderConfig,
    translator: OrderTranslator,
    cash: f64,
    position: Option<(Uuid, Position)>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    peak_equity: f64,
    submitted: usize,
    filled: usize,
    expired: usize,
}

impl OrderSimulator {
    pub fn new(config: OrderConfig) -> Self {
        Self {
            config,
            translator: OrderTranslator::new(config),
            cash: config.initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            peak_equity: config.initial_capital,
            submitted: 0,
            filled: 0,
            expired: 0,
        }
    }

    fn slip(&self, price: f64, buying: bool) -> f64 {
        let s = self.config.slippage_bps / BPS;
        if buying { price * (1.0 + s) } else { price * (1.0 - s) }
    }

    fn mark(&self, price: f64) -> f64 {
        match &self.position {
            Some((_, p)) => self.cash + p.side.sign() * (price - p.entry_price) * p.quantity,
            None => self.cash,
        }
    }

    fn close_position(&mut self, price: f64, date: NaiveDate) {
        let Some((id, p)) = self.position.take() else {
            return;
        };
        let exit_price = self.slip(price, p.side == Side::Short);
        let commission = exit_price * p.quantity * self.config.commission_rate;
        let gross = p.side.sign() * (exit_price - p.entry_price) * p.quantity;
        self.cash += gross - commission;

        let pnl = gross - commission - p.entry_commission;
        let trade = Trade {
            id,
            side: p.side,
            entry_date: p.entry_date,
            exit_date: date,
            entry_price: p.entry_price,
            exit_price,
            quantity: p.quantity,
            pnl,
            commission: commission + p.entry_commission,
            return_pct: pnl / (p.entry_price * p.quantity),
        };
        debug!("Closed {:?} {}: PnL ${:.2} ({:.2}%)", trade.side, trade.id, trade.pnl, trade.return_pct * 100.0);
        self.trades.push(trade);
    }

    fn execute(&mut self, intent: &OrderIntent, close: f64, date: NaiveDate) {
        match *intent {
            OrderIntent::MarketExit { .. } => self.close_position(close, date),
            OrderIntent::StopLimitEntry { id, side, quantity, stop, limit } => {
                let triggered = match side {
                    Side::Long => close >= stop && close <= limit,
                    Side::Short => close <= stop && close >= limit,
                };
                if !triggered {
                    self.expired += 1;
                    return;
                }
                let entry_price = self.slip(close, side == Side::Long);
                let entry_commission = entry_price * quantity * self.config.commission_rate;
                self.cash -= entry_commission;
                self.position = Some((id, Position { side, quantity, entry_price, entry_date: date, entry_commission }));
                self.filled += 1;
                debug!("Filled {:?} entry {} @ {:.4} (stop {:.4}, limit {:.4})", side, id, entry_price, stop, limit);
            }
        }
    }

    fn record(&mut self, date: NaiveDate, close: f64) {
        let equity = self.mark(close);
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let exposure = match &self.position {
            Some((_, p)) if p.side == Side::Long => 1,
            Some(_) => -1,
            None => 0,
        };
        self.equity_curve.push(EquityPoint {
            date,
            equity,
            exposure,
            drawdown: (equity - self.peak_equity) / self.peak_equity,
        });
    }

    /// Run over aligned days.  The first day only marks the book since no
    /// previous close exists to place orders against.
    pub fn run(mut self, days: &[MarketDay]) -> Result<OrderRunReport> {
        self.config.validate()?;
        if days.len() < 2 {
            bail!("order simulation needs at least 2 aligned days, got {}", days.len());
        }
        info!("Simulating orders over {} days", days.len());

        self.record(days[0].date, days[0].close);
        for pair in days.windows(2) {
            let (prev, today) = (pair[0], pair[1]);
            let open = self.position.as_ref().map(|(_, p)| (p.side, p.quantity));
            let equity = self.mark(prev.close);
            let intents = self.translator.translate(today.signal, prev.close, open, equity);
            self.submitted += intents.len();
            for intent in &intents {
                self.execute(intent, today.close, today.date);
            }
            self.record(today.date, today.close);
        }
        if let Some(last) = days.last() {
            self.close_position(last.close, last.date);
            let peak = self.peak_equity.max(self.cash);
            if let Some(point) = self.equity_curve.last_mut() {
                point.equity = self.cash;
                point.drawdown = (self.cash - peak) / peak;
            }
        }

        let equity: Vec<f64> = self.equity_curve.iter().map(|p| p.equity).collect();
        let exposure: Vec<i8> = self.equity_curve.iter().skip(1).map(|p| p.exposure).collect();
        let performance = compute_metrics(&log_returns_from_equity(&equity), &exposure, TRADING_DAYS_PER_YEAR);

        info!(
            "Order run done. Final equity: ${:.2}, trades: {}, fills: {}/{} entries",
            self.cash,
            self.trades.len(),
            self.filled,
            self.filled + self.expired
        );

        Ok(OrderRunReport {
            config: self.config,
            orders_submitted: self.submitted,
            entries_filled: self.filled,
            entries_expired: self.expired,
            final_equity: self.cash,
            trades: self.trades,
            equity_curve: self.equity_curve,
            performance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(i: u32, close: f64, signal: f64) -> MarketDay {
        MarketDay { date: NaiveDate::from_ymd_opt(2023, 1, i).unwrap(), close, signal }
    }

    fn frictionless() -> OrderConfig {
        OrderConfig { commission_rate: 0.0, slippage_bps: 0.0, ..OrderConfig::default() }
    }

    #[test]
    fn translator_flips_with_exit_then_entry() {
        let t = OrderTranslator::new(OrderConfig { stop_offset_bps: 10.0, limit_band_bps: 20.0, ..frictionless() });
        let intents = t.translate(-1.0, 100.0, Some((Side::Long, 5.0)), 1_000.0);
        assert_eq!(intents.len(), 2);
        assert!(matches!(intents[0], OrderIntent::MarketExit { side: Side::Long, quantity, .. } if quantity == 5.0));
        match intents[1] {
            OrderIntent::StopLimitEntry { side, stop, limit, .. } => {
                assert_eq!(side, Side::Short);
                assert!((stop - 99.9).abs() < 1e-9);
                assert!(limit < stop);
            }
            ref other => panic!("expected entry, got {other:?}"),
        }
        assert!(t.translate(1.0, 100.0, Some((Side::Long, 5.0)), 1_000.0).is_empty());
        assert!(t.translate(0.2, 100.0, None, 1_000.0).is_empty());
    }

    #[test]
    fn long_position_tracks_price() {
        let days = vec![day(2, 100.0, 1.0), day(3, 100.4, 1.0), day(4, 103.0, 1.0)];
        let report = OrderSimulator::new(frictionless()).run(&days).unwrap();
        assert_eq!(report.entries_filled, 1);
        assert_eq!(report.trades.len(), 1);
        // Sized off the 100 close, filled at 100.4 inside the band, exited at 103.
        let t = &report.trades[0];
        assert!((t.quantity - 1_000.0).abs() < 1e-9);
        assert!((t.pnl - 2_600.0).abs() < 1e-6);
        assert!((report.final_equity - 102_600.0).abs() < 1e-6);
    }

    #[test]
    fn entry_outside_limit_expires() {
        let cfg = OrderConfig { limit_band_bps: 10.0, ..frictionless() };
        // Gap of 5% blows through the 10bp limit band.
        let days = vec![day(2, 100.0, 1.0), day(3, 105.0, 1.0)];
        let report = OrderSimulator::new(cfg).run(&days).unwrap();
        assert_eq!(report.entries_expired, 1);
        assert!(report.trades.is_empty());
        assert_eq!(report.final_equity, 100_000.0);
    }

    #[test]
    fn short_profits_on_decline() {
        let days = vec![day(2, 100.0, -1.0), day(3, 99.8, -1.0), day(4, 90.0, -1.0)];
        let report = OrderSimulator::new(frictionless()).run(&days).unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].side, Side::Short);
        assert!(report.trades[0].pnl > 0.0);
        assert_eq!(report.equity_curve.len(), 3);
        assert_eq!(report.equity_curve[1].exposure, -1);
    }

    #[test]
    fn commissions_reduce_equity() {
        let days = vec![day(2, 100.0, 1.0), day(3, 100.0, 1.0), day(4, 100.0, 1.0)];
        let report = OrderSimulator::new(OrderConfig::default()).run(&days).unwrap();
        assert!(report.final_equity < 100_000.0);
        assert!(report.trades[0].commission > 0.0);
    }

    #[test]
    fn join_prices_inner_joins() {
        let d = |i| NaiveDate::from_ymd_opt(2023, 1, i).unwrap();
        let prices = vec![PricePoint { date: d(2), close: 10.0 }, PricePoint { date: d(4), close: 11.0 }];
        let signals = vec![
            ForecastRecord { date: d(2), signal: signal_engine::Signal::Short },
            ForecastRecord { date: d(3), signal: signal_engine::Signal::Long },
            ForecastRecord { date: d(4), signal: signal_engine::Signal::Long },
        ];
        let days = join_prices(&signals, &prices);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].signal, -1.0);
        assert_eq!(days[1].close, 11.0);
    }

    #[test]
    fn invalid_config_is_rejected_before_simulating() {
        let days = vec![day(2, 100.0, 1.0), day(3, 100.4, 1.0)];
        for cfg in [
            OrderConfig { initial_capital: 0.0, ..frictionless() },
            OrderConfig { max_position: 0.0, ..frictionless() },
            OrderConfig { slippage_bps: -1.0, ..frictionless() },
            OrderConfig { commission_rate: f64::NAN, ..frictionless() },
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?}");
            assert!(OrderSimulator::new(cfg).run(&days).is_err());
        }
        assert!(OrderConfig::default().validate().is_ok());
    }

    #[test]
    fn too_few_days_is_error() {
        assert!(OrderSimulator::new(frictionless()).run(&[day(2, 1.0, 1.0)]).is_err());
    }
}
