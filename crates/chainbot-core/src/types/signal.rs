//! Strategy output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Open or add to a long position.
    Buy,
    /// Sell the held amount of the asset.
    Sell,
    /// Exit the whole long position (for example on a stop).
    CloseLong,
    Hold,
}

impl SignalType {
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalType::Buy)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalType::Sell | SignalType::CloseLong)
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::CloseLong => "CLOSE",
            SignalType::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub strategy_name: String,
    /// Indicator readings at the time of the signal.
    pub indicators: HashMap<String, f64>,
    /// Human readable explanation, shown in notifications.
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    /// Close of the candle that produced the signal.
    pub price: f64,
    /// Candle open time in unix milliseconds.
    pub timestamp: i64,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub metadata: SignalMetadata,
}

impl Signal {
    pub fn new(
        symbol: impl Into<String>,
        signal_type: SignalType,
        strength: SignalStrength,
        price: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            signal_type,
            strength,
            price,
            timestamp,
            confidence: 0.5,
            metadata: SignalMetadata::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.metadata.strategy_name = name.into();
        self
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metadata.indicators.insert(name.into(), value);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.metadata.reason = reason.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let signal = Signal::new("ETH", SignalType::Buy, SignalStrength::Strong, 2500.0, 1)
            .with_confidence(1.7)
            .with_strategy("Low RSI")
            .with_indicator("rsi", 18.0)
            .with_reason("RSI oversold");

        assert_eq!(signal.confidence, 1.0);
        assert_eq!(signal.metadata.indicators["rsi"], 18.0);
        assert_eq!(signal.metadata.strategy_name, "Low RSI");
        assert!(signal.signal_type.is_entry());
    }

    #[test]
    fn test_exit_types() {
        assert!(SignalType::Sell.is_exit());
        assert!(SignalType::CloseLong.is_exit());
        assert!(!SignalType::Hold.is_exit());
        assert!(SignalStrength::Strong > SignalStrength::Weak);
    }
}
