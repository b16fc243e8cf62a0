//! Low RSI.
//!
//! Buys while RSI sits at or under the oversold line and sells once it
//! recovers to the exit level.

use chainbot_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, Order, Side, Signal, SignalStrength, SignalType},
};
use chainbot_indicators::StreamingRsi;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LowRsiConfig {
    pub symbols: Vec<String>,
    pub period: usize,
    /// Enter when RSI is at or below this level.
    pub entry_below: f64,
    /// Exit when RSI is at or above this level.
    pub exit_above: f64,
}

impl Default for LowRsiConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            period: 14,
            entry_below: 30.0,
            exit_above: 70.0,
        }
    }
}

impl StrategyConfig for LowRsiConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "RSI period must be at least 2".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.entry_below) || !(0.0..=100.0).contains(&self.exit_above) {
            return Err(StrategyError::InvalidConfig(
                "RSI levels must be between 0 and 100".into(),
            ));
        }
        if self.exit_above <= self.entry_below {
            return Err(StrategyError::InvalidConfig(
                "exit_above must be greater than entry_below".into(),
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

pub struct LowRsiStrategy {
    config: LowRsiConfig,
    rsi: StreamingRsi,
    last_timestamp: Option<i64>,
    in_position: bool,
    bars_processed: usize,
    signals_generated: usize,
}

impl LowRsiStrategy {
    pub fn new(config: LowRsiConfig) -> Self {
        Self {
            rsi: StreamingRsi::new(config.period),
            config,
            last_timestamp: None,
            in_position: false,
            bars_processed: 0,
            signals_generated: 0,
        }
    }

    /// Deeper readings below the entry line are stronger.
    fn classify_strength(&self, rsi: f64) -> SignalStrength {
        let depth = self.config.entry_below - rsi;
        if rsi <= 20.0 || depth >= 10.0 {
            SignalStrength::Strong
        } else if depth >= 5.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

impl Strategy for LowRsiStrategy {
    fn name(&self) -> &str {
        "Low RSI"
    }

    fn description(&self) -> &str {
        "Buys when RSI is oversold and sells when it recovers"
    }

    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal> {
        let bar = *series.last()?;
        if self.last_timestamp.is_some_and(|ts| bar.timestamp <= ts) {
            return None;
        }
        self.last_timestamp = Some(bar.timestamp);
        self.bars_processed += 1;

        let rsi = self.rsi.update(bar.close)?;

        let (signal_type, strength, reason) = if !self.in_position && rsi <= self.config.entry_below {
            (
                SignalType::Buy,
                self.classify_strength(rsi),
                format!("RSI {rsi:.1} at or below {:.1}", self.config.entry_below),
            )
        } else if self.in_position && rsi >= self.config.exit_above {
            (
                SignalType::Sell,
                SignalStrength::Moderate,
                format!("RSI {rsi:.1} recovered to {:.1}", self.config.exit_above),
            )
        } else {
            return None;
        };

        self.signals_generated += 1;
        Some(
            Signal::new(series.symbol.clone(), signal_type, strength, bar.close, bar.timestamp)
                .with_confidence(0.5 + (50.0 - rsi).abs() / 100.0)
                .with_strategy(self.name())
                .with_indicator("rsi", rsi)
                .with_reason(reason),
        )
    }

    fn on_fill(&mut self, order: &Order) {
        if order.is_filled() {
            self.in_position = order.side == Side::Buy;
        }
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.last_timestamp = None;
        self.in_position = false;
        self.bars_processed = 0;
        self.signals_generated = 0;
    }

    fn state(&self) -> StrategyState {
        StrategyState {
            name: self.name().to_string(),
            is_warmed_up: self.rsi.is_ready(),
            bars_processed: self.bars_processed,
            signals_generated: self.signals_generated,
            in_position: self.in_position,
            indicators: self
                .rsi
                .current()
                .map(|v| ("rsi".to_string(), v))
                .into_iter()
                .collect(),
            custom: serde_json::json!({
                "entry_below": self.config.entry_below,
                "exit_above": self.config.exit_above,
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
