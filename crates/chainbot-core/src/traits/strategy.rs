//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{BarSeries, Order, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Snapshot of a strategy for status replies and logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub name: String,
    pub is_warmed_up: bool,
    pub bars_processed: usize,
    pub signals_generated: usize,
    /// Whether the strategy believes it holds a position.
    pub in_position: bool,
    /// Latest indicator readings.
    pub indicators: HashMap<String, f64>,
    pub custom: serde_json::Value,
}

/// A trading strategy driven by closed candles.
///
/// Strategies only decide; sizing, risk checks and execution happen in the
/// job runner. A strategy learns that its entry or exit actually executed
/// through [`Strategy::on_fill`], so a rejected entry leaves it flat.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect the series after a new candle closed and optionally emit a signal.
    fn on_bar(&mut self, series: &BarSeries) -> Option<Signal>;

    /// Called after an order for this strategy filled.
    fn on_fill(&mut self, _order: &Order) {}

    fn reset(&mut self);

    fn state(&self) -> StrategyState;

    /// Candles needed before the first signal can be produced.
    fn warmup_period(&self) -> usize;

    fn symbols(&self) -> &[String];

    fn is_warmed_up(&self, bars_available: usize) -> bool {
        bars_available >= self.warmup_period()
    }

    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingStrategy {
        symbols: Vec<String>,
        seen: usize,
    }

    impl Strategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }

        fn on_bar(&mut self, _series: &BarSeries) -> Option<Signal> {
            self.seen += 1;
            None
        }

        fn reset(&mut self) {
            self.seen = 0;
        }

        fn state(&self) -> StrategyState {
            StrategyState {
                name: self.name().to_string(),
                bars_processed: self.seen,
                ..Default::default()
            }
        }

        fn warmup_period(&self) -> usize {
            7
        }

        fn symbols(&self) -> &[String] {
            &self.symbols
        }
    }

    #[test]
    fn test_default_warmup_check() {
        let strategy = CountingStrategy {
            symbols: vec!["ETH".into()],
            seen: 0,
        };
        assert!(!strategy.is_warmed_up(6));
        assert!(strategy.is_warmed_up(7));
        assert_eq!(strategy.description(), "");
    }
}
