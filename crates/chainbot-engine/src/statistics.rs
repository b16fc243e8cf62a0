//! Backtest statistics.

use crate::job::CloseReason;
use chainbot_core::types::{Portfolio, Side, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// One fill during a backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L, set on exits.
    pub pnl: Option<Decimal>,
    pub reason: Option<CloseReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub annualized_return_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Annualized, risk-free rate of zero.
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Closed round trips.
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub stop_loss_exits: usize,
    pub win_rate_pct: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    /// Gross profit over gross loss.
    pub profit_factor: Decimal,
    pub total_fees: Decimal,
    pub bars_processed: usize,
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<TradeRecord>,
    peak_equity: Decimal,
    returns: Vec<f64>,
}

impl BacktestStats {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            final_equity: initial_capital,
            total_return_pct: Decimal::ZERO,
            annualized_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            stop_loss_exits: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            bars_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_capital,
            returns: Vec::new(),
        }
    }

    /// Record end-of-bar equity.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        if let Some((_, prev)) = self.equity_curve.last() {
            if *prev > Decimal::ZERO {
                self.returns
                    .push(((equity - *prev) / *prev).to_f64().unwrap_or(0.0));
            }
        }
        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * Decimal::ONE_HUNDRED;
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }
        self.bars_processed += 1;
    }

    pub fn add_trade(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    /// Compute the summary figures. `timeframe` sets the annualization.
    pub fn finalize(&mut self, portfolio: &Portfolio, timeframe: Timeframe) {
        self.final_equity = portfolio.equity;
        self.total_fees = portfolio.total_fees;

        if self.initial_capital > Decimal::ZERO {
            self.total_return_pct = (self.final_equity - self.initial_capital)
                / self.initial_capital
                * Decimal::ONE_HUNDRED;
        }

        let periods_per_year = (365.0 * 86_400.0) / timeframe.as_secs() as f64;
        if !self.equity_curve.is_empty() {
            let periods = self.equity_curve.len() as f64;
            let total = self.total_return_pct.to_f64().unwrap_or(0.0) / 100.0;
            if total > -1.0 {
                let annualized = ((1.0 + total).powf(periods_per_year / periods) - 1.0) * 100.0;
                if annualized.is_finite() {
                    self.annualized_return_pct =
                        Decimal::try_from(annualized).unwrap_or(Decimal::ZERO);
                }
            }
        }

        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        self.total_trades = 0;
        self.winning_trades = 0;
        self.losing_trades = 0;
        self.stop_loss_exits = 0;
        for trade in &self.trades {
            let Some(pnl) = trade.pnl else { continue };
            self.total_trades += 1;
            if trade.reason == Some(CloseReason::StopLoss) {
                self.stop_loss_exits += 1;
            }
            if pnl > Decimal::ZERO {
                self.winning_trades += 1;
                gross_profit += pnl;
            } else if pnl < Decimal::ZERO {
                self.losing_trades += 1;
                gross_loss += pnl.abs();
            }
        }

        if self.total_trades > 0 {
            self.win_rate_pct = Decimal::from(self.winning_trades as u64) * Decimal::ONE_HUNDRED
                / Decimal::from(self.total_trades as u64);
        }
        if self.winning_trades > 0 {
            self.avg_win = gross_profit / Decimal::from(self.winning_trades as u64);
        }
        if self.losing_trades > 0 {
            self.avg_loss = gross_loss / Decimal::from(self.losing_trades as u64);
        }
        if gross_loss > Decimal::ZERO {
            self.profit_factor = gross_profit / gross_loss;
        }

        self.sharpe_ratio = sharpe(&self.returns, periods_per_year);
        self.sortino_ratio = sortino(&self.returns, periods_per_year);
    }
}

fn sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.mean();
    let std_dev = returns.std_dev();
    if std_dev.is_finite() && std_dev > 0.0 {
        mean / std_dev * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Like Sharpe, but only downside deviation counts as risk.
fn sortino(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.mean();
    let downside: Vec<f64> = returns.iter().map(|r| r.min(0.0).powi(2)).collect();
    let downside_dev = downside.mean().sqrt();
    if downside_dev.is_finite() && downside_dev > 0.0 {
        mean / downside_dev * periods_per_year.sqrt()
    } else {
        0.0
    }
}
