//! 200 EMA breakout.
//!
//! Enters when a close clears the long EMA by a buffer, optionally on
//! above-average volume, and exits on the first close back under the EMA.

use chainbot_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig, StrategyState, StreamingIndicator},
    types::{BarSeries, Order, Side, Signal, SignalStrength, SignalType},
};
use chainbot_indicators::StreamingEma;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaBreakoutConfig {
    pub symbols: Vec<String>,
    pub period: usize,
    /// Percent above the EMA a close must reach to count as a breakout.
    pub breakout_pct: f64,
    /// Required volume as a multiple of the average; 0 disables the filter.
    pub volume_factor: f64,
    pub volume_period: usize,
}

impl Default for EmaBreakoutConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            period: 200,
            breakout_pct: 0.5,
            volume_factor: 0.0,
            volume_period: 20,
        }
    }
}

impl StrategyConfig for EmaBreakoutConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "EMA period must be at least 2".into(),
            ));
        }
        if !(0.0..=50.0).contains(&self.breakout_pct) {
            return Err(StrategyError::InvalidConfig(
                "breakout_pct must be between 0 and 50".into(),
            ));
        }
        if self.volume_factor < 0.0 {
            return Err(StrategyError::InvalidConfig(
                "volume_factor cannot be negative".into(),
            ));
        }
        if self.volume_factor > 0.0 && self.volume_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "volume_period must be positive when the volume filter is on".into(),
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

pub struct EmaBreakoutStrategy {
    config: EmaBreakoutConfig,
    ema: StreamingEma,
    /// (close, ema) of the previous candle.
    prev: Option<(f64, f64)>,
    last_timestamp: Option<i64>,
    in_position: bool,
    bars_processed: usize,
    signals_generated: usize,
}

impl EmaBreakoutStrategy {
    pub fn new(config: EmaBreakoutConfig) -> Self {
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

    fn trigger(&self, ema: f64) -> f64 {
        ema * (1.0 + self.config.breakout_pct / 100.0)
    }

    /// Volume ratio of the last candle to the average of the ones before it.
    fn volume_ratio(&self, series: &BarSeries) -> Option<f64> {
        let volumes = series.volumes();
        let n = self.config.volume_period;
        if volumes.len() < n + 1 {
            return None;
        }
        let (history, last) = volumes.split_at(volumes.len() - 1);
        let avg = history[history.len() - n..].iter().sum::<f64>() / n as f64;
        (avg > 0.0).then(|| last[0] / avg)
    }
}

impl Strategy for EmaBreakoutStrategy {
    fn name(&self) -> &str {
        "200 EMA Breakout"
    }

    fn description(&self) -> &str {
        "Buys when the close breaks above the long EMA, exits when it closes back below"
    }

    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal> {
        let bar = *series.last()?;
        if self.last_timestamp.is_some_and(|ts| bar.timestamp <= ts) {
            return None;
        }
        self.last_timestamp = Some(bar.timestamp);
        self.bars_processed += 1;

        let ema = self.ema.update(bar.close)?;
        let (prev_close, prev_ema) = self.prev.replace((bar.close, ema))?;

        if self.in_position {
            if bar.close >= ema {
                return None;
            }
            self.signals_generated += 1;
            return Some(
                Signal::new(
                    series.symbol.clone(),
                    SignalType::Sell,
                    SignalStrength::Moderate,
                    bar.close,
                    bar.timestamp,
                )
                .with_strategy(self.name())
                .with_indicator("ema", ema)
                .with_reason(format!(
                    "Close {:.4} lost EMA{} {:.4}",
                    bar.close, self.config.period, ema
                )),
            );
        }

        let trigger = self.trigger(ema);
        if prev_close > self.trigger(prev_ema) || bar.close <= trigger {
            return None;
        }

        let volume_ratio = self.volume_ratio(series);
        if self.config.volume_factor > 0.0
            && volume_ratio.map_or(true, |r| r < self.config.volume_factor)
        {
            tracing::debug!(
                symbol = %series.symbol,
                ratio = volume_ratio.unwrap_or(0.0),
                "breakout skipped on low volume"
            );
            return None;
        }

        let strength = match volume_ratio {
            Some(r) if r >= 2.0 => SignalStrength::Strong,
            Some(r) if r >= 1.2 => SignalStrength::Moderate,
            _ => SignalStrength::Weak,
        };
        self.signals_generated += 1;
        let mut signal = Signal::new(
            series.symbol.clone(),
            SignalType::Buy,
            strength,
            bar.close,
            bar.timestamp,
        )
        .with_confidence(0.6)
        .with_strategy(self.name())
        .with_indicator("ema", ema)
        .with_indicator("trigger", trigger)
        .with_reason(format!(
            "Close {:.4} broke above EMA{} {:.4} (+{}%)",
            bar.close, self.config.period, ema, self.config.breakout_pct
        ));
        if let Some(r) = volume_ratio {
            signal = signal.with_indicator("volume_ratio", r);
        }
        Some(signal)
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
            is_warmed_up: self.ema.is_ready(),
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
                "breakout_pct": self.config.breakout_pct,
                "volume_factor": self.config.volume_factor,
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
    use crate::test_support::{bar, run};
    use chainbot_core::types::Timeframe;

    fn config() -> EmaBreakoutConfig {
        EmaBreakoutConfig {
            symbols: vec!["ETH".into()],
            period: 10,
            breakout_pct: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_validation() {
        assert!(config().validate().is_ok());
        assert!(EmaBreakoutConfig {
            volume_factor: -1.0,
            ..config()
        }
        .validate()
        .is_err());
        assert!(EmaBreakoutConfig {
            volume_period: 0,
            volume_factor: 1.5,
            ..config()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_needs_buffer_before_entry() {
        let mut closes = vec![100.0; 12];
        closes.push(100.5); // above EMA but inside the 1% buffer
        closes.push(103.0); // clears the buffer
        closes.push(104.0);
        closes.push(98.0); // back under the EMA

        let mut strategy = EmaBreakoutStrategy::new(config());
        let signals = run(&mut strategy, &closes);
        let kinds: Vec<(usize, SignalType)> =
            signals.iter().map(|(i, s)| (*i, s.signal_type)).collect();
        assert_eq!(kinds, vec![(13, SignalType::Buy), (15, SignalType::Sell)]);
        assert!(signals[0].1.metadata.indicators["trigger"] > 100.0);
    }

    #[test]
    fn test_volume_filter_blocks_quiet_breakout() {
        let mut strategy = EmaBreakoutStrategy::new(EmaBreakoutConfig {
            volume_factor: 1.5,
            volume_period: 5,
            ..config()
        });
        let mut series = BarSeries::new("ETH", Timeframe::Hour1);
        for i in 0..12 {
            series.push(bar(i, 100.0, 1_000.0));
            assert!(strategy.on_bar(&series).is_none());
        }
        series.push(bar(12, 103.0, 1_100.0));
        assert!(strategy.on_bar(&series).is_none());

        let mut strategy = EmaBreakoutStrategy::new(EmaBreakoutConfig {
            volume_factor: 1.5,
            volume_period: 5,
            ..config()
        });
        let mut series = BarSeries::new("ETH", Timeframe::Hour1);
        for i in 0..12 {
            series.push(bar(i, 100.0, 1_000.0));
            strategy.on_bar(&series);
        }
        series.push(bar(12, 103.0, 2_500.0));
        let signal = strategy.on_bar(&series).expect("breakout on volume");
        assert_eq!(signal.strength, SignalStrength::Strong);
        assert_eq!(signal.metadata.indicators["volume_ratio"], 2.5);
    }
}
