//! 7 EMA crossover.
//!
//! Buys when the close crosses from at or below a short EMA to above it and
//! exits when a close falls back under the EMA.

use chainbot_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, Order, Side, Signal, SignalStrength, SignalType},
};
use chainbot_indicators::StreamingEma;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaCrossoverConfig {
    pub symbols: Vec<String>,
    pub period: usize,
    /// Minimum distance above the EMA, in percent, for an entry to count.
    pub threshold_pct: f64,
}

impl Default for EmaCrossoverConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            period: 7,
            threshold_pct: 0.0,
        }
    }
}

impl StrategyConfig for EmaCrossoverConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "EMA period must be at least 2".into(),
            ));
        }
        if !(0.0..=50.0).contains(&self.threshold_pct) {
            return Err(StrategyError::InvalidConfig(
                "threshold_pct must be between 0 and 50".into(),
            ));
        }
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        Ok(())
    }
}

pub struct EmaCrossoverStrategy {
    config: EmaCrossoverConfig,
    ema: StreamingEma,
    /// (close, ema) of the previous candle.
    prev: Option<(f64, f64)>,
    last_timestamp: Option<i64>,
    in_position: bool,
    bars_processed: usize,
    signals_generated: usize,
}

impl EmaCrossoverStrategy {
    pub fn new(config: EmaCrossoverConfig) -> Self {
        Self {
            ema: StreamingEma::new(config.period),
            config,
            prev: None,
            last_timestamp: None,
            in_position: false,
            bars_processed: 0,
            signals_generated: 0,
        }
    }

    fn classify_strength(distance: f64) -> SignalStrength {
        if distance > 0.02 {
            SignalStrength::Strong
        } else if distance > 0.01 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

impl Strategy for EmaCrossoverStrategy {
    fn name(&self) -> &str {
        "7 EMA Crossover"
    }

    fn description(&self) -> &str {
        "Buys when price crosses above the short EMA, exits when it closes back below"
    }

    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal> {
        let bar = *series.last()?;
        if self.last_timestamp.is_some_and(|ts| bar.timestamp <= ts) {
            return None;
        }
        self.last_timestamp = Some(bar.timestamp);
        self.bars_processed += 1;

        let ema = self.ema.update(bar.close)?;
        let prev = self.prev.replace((bar.close, ema));
        let (prev_close, prev_ema) = prev?;
        if ema <= 0.0 {
            return None;
        }
        let distance = (bar.close - ema) / ema;

        let signal_type = if !self.in_position
            && prev_close <= prev_ema
            && bar.close > ema
            && distance * 100.0 >= self.config.threshold_pct
        {
            SignalType::Buy
        } else if self.in_position && bar.close < ema {
            SignalType::Sell
        } else {
            return None;
        };

        self.signals_generated += 1;
        let reason = match signal_type {
            SignalType::Buy => format!(
                "Close {:.4} crossed above EMA{} {:.4}",
                bar.close, self.config.period, ema
            ),
            _ => format!(
                "Close {:.4} fell below EMA{} {:.4}",
                bar.close, self.config.period, ema
            ),
        };
        Some(
            Signal::new(
                series.symbol.clone(),
                signal_type,
                Self::classify_strength(distance.abs()),
                bar.close,
                bar.timestamp,
            )
            .with_confidence(0.5 + distance.abs() * 10.0)
            .with_strategy(self.name())
            .with_indicator("ema", ema)
            .with_indicator("distance_pct", distance * 100.0)
            .with_reason(reason),
        )
    }

    fn on_fill(&mut self, order: &Order) {
        if order.is_filled() {
            self.in_position = order.side == Side::Buy;
        }
    }

    fn reset(&mut self) {
        self.ema.reset();
        self.prev = None;
        self.last_timestamp = None;
        self.in_position = false;
        self.bars_processed = 0;
        self.signals_generated = 0;
    }

    fn state(&self) -> StrategyState {
        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.bars_processed >= self.warmup_period(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            in_position: self.in_position,
            indicators: self
                .ema
                .current()
                .map(|v| ("ema".to_string(), v))
                .into_iter()
                .collect(),
            custom: serde_json::json!({
                "period": self.config.period,
                "threshold_pct": self.config.threshold_pct,
            }),
        }
    }

    fn warmup_period(&self) -> usize {
        self.config.period + 1
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::run;

    fn strategy() -> EmaCrossoverStrategy {
        EmaCrossoverStrategy::new(EmaCrossoverConfig {
            symbols: vec!["ETH".into()],
            ..Default::default()
        })
    }

    #[test]
    fn test_config_validation() {
        let mut config = EmaCrossoverConfig {
            symbols: vec!["ETH".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        config.period = 1;
        assert!(config.validate().is_err());
        config.period = 7;
        config.symbols.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buy_on_cross_then_sell_on_drop() {
        let mut closes = vec![100.0; 10];
        closes.extend([99.0, 98.0, 97.0]);
        closes.push(104.0); // cross up
        closes.extend([105.0, 106.0]);
        closes.push(95.0); // close under the EMA

        let mut s = strategy();
        let signals = run(&mut s, &closes);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].0, 13);
        assert_eq!(signals[0].1.signal_type, SignalType::Buy);
        assert!(signals[0].1.metadata.indicators.contains_key("ema"));
        assert_eq!(signals[1].0, 16);
        assert_eq!(signals[1].1.signal_type, SignalType::Sell);
        assert!(!s.state().in_position);
    }

    #[test]
    fn test_exit_and_reentry() {
        let mut closes = vec![100.0; 10];
        closes.extend([99.0, 103.0, 99.5, 104.0]);
        let mut s = strategy();
        let signals = run(&mut s, &closes);
        let kinds: Vec<SignalType> = signals.iter().map(|(_, s)| s.signal_type).collect();
        assert_eq!(kinds, vec![SignalType::Buy, SignalType::Sell, SignalType::Buy]);
    }

    #[test]
    fn test_unfilled_entry_keeps_strategy_flat() {
        let mut s = strategy();
        let mut series = BarSeries::new("ETH", chainbot_core::types::Timeframe::Hour1);
        let mut closes = vec![100.0; 9];
        closes.push(110.0);
        let mut got = None;
        for (i, c) in closes.iter().enumerate() {
            series.push(crate::test_support::bar(i, *c, 1.0));
            got = s.on_bar(&series).or(got);
        }
        assert_eq!(got.map(|s| s.signal_type), Some(SignalType::Buy));
        assert!(!s.state().in_position);
    }

    #[test]
    fn test_duplicate_candle_ignored() {
        let mut s = strategy();
        let mut series = BarSeries::new("ETH", chainbot_core::types::Timeframe::Hour1);
        series.push(crate::test_support::bar(0, 100.0, 1.0));
        s.on_bar(&series);
        s.on_bar(&series);
        assert_eq!(s.state().bars_processed, 1);
    }
}
