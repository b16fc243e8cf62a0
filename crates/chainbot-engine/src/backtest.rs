//! Historical replay of a strategy job.

use crate::job::{CloseReason, EventKind, JobSpec, StrategyJob};
use crate::report::BacktestReport;
use crate::statistics::{BacktestStats, TradeRecord};
use chainbot_broker::PaperConfig;
use chainbot_core::error::BotError;
use chainbot_core::types::{Bar, Side, Timeframe};
use chainbot_risk::RiskConfig;
use chainbot_strategies::StrategyRegistry;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub paper: PaperConfig,
    pub risk: RiskConfig,
    pub stop_loss_pct: Option<Decimal>,
}

impl BacktestConfig {
    pub fn new(strategy_type: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            parameters: serde_json::Value::Null,
            symbol: symbol.into(),
            timeframe: Timeframe::default(),
            paper: PaperConfig::default(),
            risk: RiskConfig::default(),
            stop_loss_pct: None,
        }
    }
}

/// Replays candles through the same [`StrategyJob`] the live scheduler uses.
pub struct Backtester {
    config: BacktestConfig,
    registry: StrategyRegistry,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            registry: StrategyRegistry::new(),
        }
    }

    pub async fn run(&self, bars: &[Bar]) -> Result<BacktestReport, BotError> {
        let spec = JobSpec {
            job_id: 0,
            user_id: 0,
            strategy_type: self.config.strategy_type.clone(),
            symbol: self.config.symbol.clone(),
            timeframe: self.config.timeframe,
            parameters: self.config.parameters.clone(),
            stop_loss_pct: self.config.stop_loss_pct,
            max_slippage_pct: None,
        };
        let mut job = StrategyJob::new(
            spec,
            &self.registry,
            self.config.risk.clone(),
            self.config.paper.clone(),
        )?;
        let strategy_name = job.strategy().name().to_string();

        let mut stats = BacktestStats::new(self.config.paper.initial_capital);
        let mut rejected = 0usize;

        for bar in bars {
            for event in job.process_bar(*bar).await {
                let timestamp = event.datetime();
                match event.kind {
                    EventKind::Opened {
                        quantity, price, ..
                    } => stats.add_trade(TradeRecord {
                        symbol: event.symbol,
                        side: Side::Buy,
                        quantity,
                        price,
                        timestamp,
                        pnl: None,
                        reason: None,
                    }),
                    EventKind::Closed {
                        quantity,
                        price,
                        pnl,
                        reason,
                    } => stats.add_trade(TradeRecord {
                        symbol: event.symbol,
                        side: Side::Sell,
                        quantity,
                        price,
                        timestamp,
                        pnl: Some(pnl),
                        reason: Some(reason),
                    }),
                    EventKind::Rejected { .. } | EventKind::Failed { .. } => rejected += 1,
                }
            }
            let equity = job.broker().portfolio_snapshot().await.equity;
            stats.record_equity(bar.timestamp, equity);
        }

        let mut final_portfolio = job.broker().portfolio_snapshot().await;

        // Mark the open position as a closing trade so the round trip counts.
        if let (Some(position), Some(last)) =
            (final_portfolio.get_position(&self.config.symbol), bars.last())
        {
            stats.add_trade(TradeRecord {
                symbol: position.symbol.clone(),
                side: Side::Sell,
                quantity: position.quantity,
                price: position.current_price,
                timestamp: DateTime::from_timestamp_millis(last.timestamp).unwrap_or_else(Utc::now),
                pnl: Some(position.unrealized_pnl()),
                reason: Some(CloseReason::Signal),
            });
        }
        final_portfolio.update_equity();
        stats.finalize(&final_portfolio, self.config.timeframe);

        info!(
            strategy = %strategy_name,
            bars = bars.len(),
            trades = stats.total_trades,
            rejected,
            return_pct = %stats.total_return_pct.round_dp(2),
            "backtest finished"
        );

        Ok(BacktestReport {
            strategy: strategy_name,
            config: self.config.clone(),
            stats,
            final_portfolio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wave(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let price = 100.0 + (i as f64 * 0.3).sin() * 10.0;
                Bar::new(i as i64 * 3_600_000, price, price + 1.0, price - 1.0, price, 1_000.0)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_backtest_runs() {
        let mut config = BacktestConfig::new("ema_crossover", "ETH");
        config.paper.initial_capital = dec!(10000);

        let report = Backtester::new(config).run(&wave(200)).await.unwrap();

        assert_eq!(report.stats.bars_processed, 200);
        assert_eq!(report.stats.equity_curve.len(), 200);
        assert!(report.stats.total_trades > 0);
        assert_eq!(report.strategy, "7 EMA Crossover");
    }

    #[tokio::test]
    async fn test_flat_market_has_no_trades() {
        let bars: Vec<Bar> = (0..100)
            .map(|i| Bar::new(i * 3_600_000, 100.0, 100.5, 99.5, 100.0, 10.0))
            .collect();

        let report = Backtester::new(BacktestConfig::new("low_rsi", "ETH"))
            .run(&bars)
            .await
            .unwrap();

        assert_eq!(report.stats.total_trades, 0);
        assert_eq!(report.stats.final_equity, dec!(10000));
    }

    #[tokio::test]
    async fn test_unknown_strategy_errors() {
        let result = Backtester::new(BacktestConfig::new("unknown", "ETH"))
            .run(&wave(10))
            .await;
        assert!(result.is_err());
    }
}
