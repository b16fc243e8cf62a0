//! A single strategy instance trading its own paper account.

use chainbot_broker::{PaperBroker, PaperConfig};
use chainbot_core::error::BotError;
use chainbot_core::traits::{Broker, Strategy};
use chainbot_core::types::{Bar, BarSeries, Order, Side, Signal, SignalType, Timeframe};
use chainbot_indicators::Atr;
use chainbot_risk::{RiskConfig, RiskDecision, RiskManager};
use chainbot_strategies::StrategyRegistry;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const ATR_PERIOD: usize = 14;

/// What to run: one strategy on one symbol and timeframe for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: i64,
    pub user_id: i64,
    pub strategy_type: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Overrides the configured stop-loss method with a fixed percent stop.
    pub stop_loss_pct: Option<Decimal>,
    /// The user's slippage limit; fills slipping further are refused.
    #[serde(default)]
    pub max_slippage_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Signal,
    StopLoss,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Signal => "signal",
            CloseReason::StopLoss => "stop_loss",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Opened {
        quantity: Decimal,
        price: Decimal,
        stop_price: Option<Decimal>,
    },
    Closed {
        quantity: Decimal,
        price: Decimal,
        pnl: Decimal,
        reason: CloseReason,
    },
    Rejected {
        reason: String,
    },
    Failed {
        message: String,
    },
}

/// Something a job did that its owner may want to hear about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub job_id: i64,
    pub user_id: i64,
    pub symbol: String,
    /// Open time of the candle that caused the event.
    pub timestamp: i64,
    pub kind: EventKind,
}

impl EngineEvent {
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_else(Utc::now)
    }

    pub fn is_trade(&self) -> bool {
        matches!(self.kind, EventKind::Opened { .. } | EventKind::Closed { .. })
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default()
}

/// Strategy, risk manager and paper broker wired together.
///
/// Candles go in through [`StrategyJob::process_bar`], events come out. The
/// job checks its stop before asking the strategy for a signal, so a candle
/// that both hits the stop and produces a new entry is handled in that order.
pub struct StrategyJob {
    spec: JobSpec,
    strategy: Box<dyn Strategy>,
    risk: RiskManager,
    broker: PaperBroker,
    series: BarSeries,
    atr: Option<Atr>,
    stop_price: Option<Decimal>,
    last_timestamp: Option<i64>,
    day_rolled: bool,
    trading: bool,
}

impl StrategyJob {
    pub fn new(
        spec: JobSpec,
        registry: &StrategyRegistry,
        risk: RiskConfig,
        mut paper: PaperConfig,
    ) -> Result<Self, BotError> {
        let strategy = registry.create(
            &spec.strategy_type,
            spec.parameters.clone(),
            vec![spec.symbol.clone()],
        )?;

        let mut risk = RiskManager::new(risk);
        if let Some(pct) = spec.stop_loss_pct {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
                return Err(BotError::Validation(format!(
                    "stop-loss must be between 0 and 100 percent, got {pct}"
                )));
            }
            risk = risk.with_stop_loss_pct(pct);
        }
        let atr = risk.stop_loss().needs_atr().then(|| Atr::new(ATR_PERIOD));
        if spec.max_slippage_pct.is_some() {
            paper.max_slippage_pct = spec.max_slippage_pct;
        }

        let capacity = (strategy.warmup_period() * 2).max(500);
        let series = BarSeries::with_capacity(spec.symbol.clone(), spec.timeframe, capacity);

        Ok(Self {
            strategy,
            risk,
            broker: PaperBroker::new(paper),
            series,
            atr,
            stop_price: None,
            last_timestamp: None,
            day_rolled: false,
            trading: true,
            spec,
        })
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    /// Feed history through the strategy without trading on it.
    pub async fn warm_up(&mut self, bars: &[Bar]) -> usize {
        self.trading = false;
        let mut fed = 0;
        for bar in bars {
            if self.accept(bar) {
                self.observe(bar).await;
                self.strategy.on_bar(&self.series);
                fed += 1;
            }
        }
        self.trading = true;
        debug!(
            job_id = self.spec.job_id,
            bars = fed,
            warmed_up = self.strategy.state().is_warmed_up,
            "job warmed up"
        );
        fed
    }

    /// Process one closed candle.
    pub async fn process_bar(&mut self, bar: Bar) -> Vec<EngineEvent> {
        if !self.accept(&bar) {
            return Vec::new();
        }
        self.observe(&bar).await;

        let mut events = Vec::new();
        if let Some(event) = self.check_stop(&bar).await {
            events.push(event);
        }

        if let Some(signal) = self.strategy.on_bar(&self.series) {
            if self.trading {
                if let Some(event) = self.handle_signal(&bar, signal).await {
                    events.push(event);
                }
            }
        }
        events
    }

    fn accept(&mut self, bar: &Bar) -> bool {
        if self.last_timestamp.is_some_and(|last| bar.timestamp <= last) || !bar.is_valid() {
            return false;
        }
        if let Some(last) = self.last_timestamp {
            if bar.timestamp / 86_400_000 != last / 86_400_000 {
                self.day_rolled = true;
            }
        }
        self.last_timestamp = Some(bar.timestamp);
        true
    }

    async fn observe(&mut self, bar: &Bar) {
        self.series.push(*bar);
        if std::mem::take(&mut self.day_rolled) {
            self.broker.start_new_day().await;
        }
        self.broker.set_price(&self.spec.symbol, to_decimal(bar.close)).await;

        if let Some(atr) = &self.atr {
            let bars: Vec<Bar> = self.series.iter().copied().collect();
            if let Some(value) = atr.calculate_bars(&bars).last() {
                self.risk.update_atr(to_decimal(*value));
            }
        }
    }

    fn event(&self, bar: &Bar, kind: EventKind) -> EngineEvent {
        EngineEvent {
            job_id: self.spec.job_id,
            user_id: self.spec.user_id,
            symbol: self.spec.symbol.clone(),
            timestamp: bar.timestamp,
            kind,
        }
    }

    /// Longs stop out when the candle low touches the stop. A candle that
    /// opens below the stop fills at the open.
    async fn check_stop(&mut self, bar: &Bar) -> Option<EngineEvent> {
        let stop = self.stop_price?;
        let holding = self
            .broker
            .get_position(&self.spec.symbol)
            .await
            .ok()
            .flatten()
            .is_some_and(|p| !p.is_flat());
        if !holding {
            self.stop_price = None;
            return None;
        }

        if !self.risk.stop_loss().is_triggered(stop, to_decimal(bar.low)) {
            let raised = self
                .risk
                .stop_loss()
                .update_trailing_stop(stop, to_decimal(bar.close));
            if raised > stop {
                debug!(job_id = self.spec.job_id, from = %stop, to = %raised, "trailing stop raised");
                self.stop_price = Some(raised);
            }
            return None;
        }

        let exit_price = stop.min(to_decimal(bar.open));
        self.broker.set_price(&self.spec.symbol, exit_price).await;
        let result = self.close(bar, CloseReason::StopLoss).await;
        self.broker
            .set_price(&self.spec.symbol, to_decimal(bar.close))
            .await;
        Some(result)
    }

    async fn close(&mut self, bar: &Bar, reason: CloseReason) -> EngineEvent {
        let realized_before = self.broker.portfolio_snapshot().await.total_realized_pnl;
        match self.broker.close_position(&self.spec.symbol).await {
            Ok(order) if order.is_filled() => {
                self.strategy.on_fill(&order);
                self.stop_price = None;
                let realized_after = self.broker.portfolio_snapshot().await.total_realized_pnl;
                let price = order.filled_avg_price.unwrap_or_default();
                info!(
                    job_id = self.spec.job_id,
                    symbol = %self.spec.symbol,
                    price = %price,
                    reason = %reason,
                    "position closed"
                );
                self.event(
                    bar,
                    EventKind::Closed {
                        quantity: order.filled_quantity,
                        price,
                        pnl: realized_after - realized_before,
                        reason,
                    },
                )
            }
            Ok(order) => self.event(
                bar,
                EventKind::Rejected {
                    reason: order
                        .reject_reason
                        .unwrap_or_else(|| "close order not filled".to_string()),
                },
            ),
            Err(e) => {
                warn!(job_id = self.spec.job_id, error = %e, "close failed");
                self.event(bar, EventKind::Failed { message: e.to_string() })
            }
        }
    }

    async fn handle_signal(&mut self, bar: &Bar, signal: Signal) -> Option<EngineEvent> {
        let portfolio = self.broker.portfolio_snapshot().await;
        let price = to_decimal(bar.close);

        if signal.signal_type.is_exit() {
            if !portfolio.has_position(&self.spec.symbol) {
                return None;
            }
            return Some(self.close(bar, CloseReason::Signal).await);
        }
        if signal.signal_type != SignalType::Buy {
            return None;
        }

        if let Some(reason) = self.risk.should_halt(&portfolio) {
            return Some(self.event(bar, EventKind::Rejected { reason }));
        }

        let decision = self.risk.evaluate_signal(&portfolio, &signal, price);
        let order = match &decision {
            RiskDecision::Rejected { reason } => {
                debug!(job_id = self.spec.job_id, reason = %reason, "entry rejected");
                return Some(self.event(bar, EventKind::Rejected { reason: reason.clone() }));
            }
            RiskDecision::Modified { order, reason, .. } => {
                debug!(job_id = self.spec.job_id, reason = %reason, "entry reduced");
                order.clone()
            }
            RiskDecision::Approved { order, .. } => order.clone(),
        };

        match self.broker.submit_order(order).await {
            Ok(order) if order.is_filled() => Some(self.opened(bar, &order, &decision)),
            Ok(order) => Some(self.event(
                bar,
                EventKind::Rejected {
                    reason: order
                        .reject_reason
                        .unwrap_or_else(|| "entry order not filled".to_string()),
                },
            )),
            Err(e) => Some(self.event(bar, EventKind::Rejected { reason: e.to_string() })),
        }
    }

    fn opened(&mut self, bar: &Bar, order: &Order, decision: &RiskDecision) -> EngineEvent {
        self.strategy.on_fill(order);
        let price = order.filled_avg_price.unwrap_or_default();
        // Stop distance is measured from the actual fill.
        self.stop_price = decision
            .stop_loss_price()
            .and_then(|_| self.risk.stop_loss().calculate_stop_price(price));
        info!(
            job_id = self.spec.job_id,
            symbol = %self.spec.symbol,
            side = %Side::Buy,
            quantity = %order.filled_quantity,
            price = %price,
            "position opened"
        );
        self.event(
            bar,
            EventKind::Opened {
                quantity: order.filled_quantity,
                price,
                stop_price: self.stop_price,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbot_risk::{PositionSizingMethod, StopLossMethod};
    use rust_decimal_macros::dec;

    fn bar(i: i64, close: f64) -> Bar {
        Bar::new(i * 3_600_000, close, close + 0.5, close - 0.5, close, 1_000.0)
    }

    fn spec(stop_loss_pct: Option<Decimal>) -> JobSpec {
        JobSpec {
            job_id: 7,
            user_id: 42,
            strategy_type: "ema_crossover".into(),
            symbol: "ETH".into(),
            timeframe: Timeframe::Hour1,
            parameters: serde_json::json!({"period": 3}),
            stop_loss_pct,
            max_slippage_pct: None,
        }
    }

    fn job(stop_loss_pct: Option<Decimal>) -> StrategyJob {
        let paper = PaperConfig {
            initial_capital: dec!(10000),
            slippage_pct: Decimal::ZERO,
            fee_pct: Decimal::ZERO,
            max_slippage_pct: None,
        };
        StrategyJob::new(spec(stop_loss_pct), &StrategyRegistry::new(), risk(), paper).unwrap()
    }

    fn risk() -> RiskConfig {
        RiskConfig {
            position_sizing: PositionSizingMethod::PercentEquity { percent: dec!(10) },
            stop_loss: StopLossMethod::FixedPercent { percent: dec!(5) },
            use_signal_strength: false,
            ..RiskConfig::default()
        }
    }

    async fn feed(job: &mut StrategyJob, closes: &[f64]) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for (i, &close) in closes.iter().enumerate() {
            events.extend(job.process_bar(bar(i as i64, close)).await);
        }
        events
    }

    #[tokio::test]
    async fn test_entry_then_exit_on_signal() {
        let mut job = job(None);
        let events = feed(&mut job, &[100.0, 99.0, 98.0, 97.0, 96.0, 100.0, 101.0, 97.0]).await;

        let opened = events
            .iter()
            .position(|e| matches!(e.kind, EventKind::Opened { .. }))
            .expect("entry");
        let closed = events
            .iter()
            .position(|e| matches!(e.kind, EventKind::Closed { reason: CloseReason::Signal, .. }))
            .expect("exit");
        assert!(opened < closed);
        assert_eq!(events[opened].user_id, 42);
        assert!(!job.broker().portfolio_snapshot().await.has_position("ETH"));
    }

    #[tokio::test]
    async fn test_stop_loss_closes_on_low() {
        let mut job = job(Some(dec!(2)));
        let events = feed(&mut job, &[100.0, 99.0, 98.0, 97.0, 96.0, 100.0]).await;
        let Some(EventKind::Opened { stop_price, price, .. }) =
            events.last().map(|e| e.kind.clone())
        else {
            panic!("expected entry, got {events:?}");
        };
        assert_eq!(price, dec!(100));
        assert_eq!(stop_price, Some(dec!(98)));

        // Low of 97.5 touches the 98 stop while the close stays above the EMA.
        let crash = Bar::new(6 * 3_600_000, 100.5, 101.0, 97.5, 100.8, 1_000.0);
        let events = job.process_bar(crash).await;
        let closed = events
            .iter()
            .find_map(|e| match &e.kind {
                EventKind::Closed { reason, price, pnl, .. } => Some((*reason, *price, *pnl)),
                _ => None,
            })
            .expect("stop exit");
        assert_eq!(closed.0, CloseReason::StopLoss);
        assert_eq!(closed.1, dec!(98));
        assert!(closed.2 < Decimal::ZERO);
        assert!(job.stop_price().is_none());
        assert!(!job.strategy().state().in_position);
    }

    #[tokio::test]
    async fn test_warm_up_does_not_trade() {
        let mut job = job(None);
        let history: Vec<Bar> = [100.0, 99.0, 98.0, 97.0, 96.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i as i64, c))
            .collect();

        assert_eq!(job.warm_up(&history).await, 6);
        assert!(job.broker().portfolio_snapshot().await.positions.is_empty());
        assert!(job.strategy().state().is_warmed_up);
    }

    #[tokio::test]
    async fn test_stale_bars_are_ignored() {
        let mut job = job(None);
        feed(&mut job, &[100.0, 101.0, 102.0]).await;
        assert!(job.process_bar(bar(1, 50.0)).await.is_empty());
        assert!(job.process_bar(bar(2, 50.0)).await.is_empty());
        assert_eq!(job.last_timestamp(), Some(2 * 3_600_000));
    }

    #[tokio::test]
    async fn test_user_slippage_limit_blocks_entry() {
        let mut spec = spec(None);
        spec.max_slippage_pct = Some(dec!(0.01));
        let paper = PaperConfig {
            slippage_pct: dec!(0.05),
            ..PaperConfig::default()
        };
        let mut job =
            StrategyJob::new(spec, &StrategyRegistry::new(), risk(), paper).unwrap();
        assert_eq!(job.broker().config().max_slippage_pct, Some(dec!(0.01)));

        let events = feed(&mut job, &[100.0, 99.0, 98.0, 97.0, 96.0, 100.0]).await;
        assert!(!events.iter().any(|e| matches!(e.kind, EventKind::Opened { .. })));
        assert!(events.iter().any(|e| matches!(
            &e.kind,
            EventKind::Rejected { reason } if reason.contains("exceeds")
        )));
        assert!(job.broker().portfolio_snapshot().await.positions.is_empty());
    }

    #[test]
    fn test_rejects_bad_stop_loss() {
        let result = StrategyJob::new(
            spec(Some(dec!(150))),
            &StrategyRegistry::new(),
            RiskConfig::default(),
            PaperConfig::default(),
        );
        assert!(matches!(result, Err(BotError::Validation(_))));
    }

    #[test]
    fn test_unknown_strategy() {
        let mut spec = spec(None);
        spec.strategy_type = "martingale".into();
        let result = StrategyJob::new(
            spec,
            &StrategyRegistry::new(),
            RiskConfig::default(),
            PaperConfig::default(),
        );
        assert!(matches!(result, Err(BotError::Strategy(_))));
    }
}
