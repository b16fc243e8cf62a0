//! Stop-losses for long spot positions.

use chainbot_core::types::Position;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum StopLossMethod {
    /// Percent below the entry price.
    FixedPercent { percent: Decimal },
    /// Quote currency distance below the entry price.
    FixedAmount { amount: Decimal },
    /// ATR multiple below the entry price.
    Atr { multiplier: Decimal },
    /// Percent below the highest close since entry.
    TrailingPercent { percent: Decimal },
    /// ATR multiple below the highest close since entry.
    TrailingAtr { multiplier: Decimal },
}

impl Default for StopLossMethod {
    fn default() -> Self {
        StopLossMethod::FixedPercent { percent: dec!(5) }
    }
}

/// Stop attached to an open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStop {
    pub symbol: String,
    pub stop_price: Decimal,
    pub quantity: Decimal,
    pub is_trailing: bool,
}

#[derive(Debug, Clone)]
pub struct StopLossManager {
    method: StopLossMethod,
    current_atr: Option<Decimal>,
}

impl StopLossManager {
    pub fn new(method: StopLossMethod) -> Self {
        Self {
            method,
            current_atr: None,
        }
    }

    /// Manager for a per-strategy percent stop.
    pub fn percent(percent: Decimal) -> Self {
        Self::new(StopLossMethod::FixedPercent { percent })
    }

    pub fn method(&self) -> &StopLossMethod {
        &self.method
    }

    pub fn needs_atr(&self) -> bool {
        matches!(
            self.method,
            StopLossMethod::Atr { .. } | StopLossMethod::TrailingAtr { .. }
        )
    }

    pub fn update_atr(&mut self, atr: Decimal) {
        self.current_atr = Some(atr);
    }

    pub fn is_trailing(&self) -> bool {
        matches!(
            self.method,
            StopLossMethod::TrailingPercent { .. } | StopLossMethod::TrailingAtr { .. }
        )
    }

    /// Distance below `price` for this method, `None` while ATR is unknown.
    fn offset(&self, price: Decimal) -> Option<Decimal> {
        match &self.method {
            StopLossMethod::FixedPercent { percent }
            | StopLossMethod::TrailingPercent { percent } => Some(price * *percent / dec!(100)),
            StopLossMethod::FixedAmount { amount } => Some(*amount),
            StopLossMethod::Atr { multiplier } | StopLossMethod::TrailingAtr { multiplier } => {
                self.current_atr.map(|atr| atr * *multiplier)
            }
        }
    }

    /// Initial stop for a long entry. Never negative.
    pub fn calculate_stop_price(&self, entry_price: Decimal) -> Option<Decimal> {
        self.offset(entry_price)
            .map(|off| (entry_price - off).max(Decimal::ZERO))
    }

    /// Ratchet a trailing stop up behind `price`; it never moves down.
    pub fn update_trailing_stop(&self, current_stop: Decimal, price: Decimal) -> Decimal {
        if !self.is_trailing() {
            return current_stop;
        }
        match self.offset(price) {
            Some(off) => (price - off).max(current_stop),
            None => current_stop,
        }
    }

    /// Inclusive: a price touching the stop triggers it.
    pub fn is_triggered(&self, stop_price: Decimal, price: Decimal) -> bool {
        price <= stop_price
    }

    pub fn create_stop(&self, position: &Position) -> Option<ActiveStop> {
        if position.is_flat() {
            return None;
        }
        Some(ActiveStop {
            symbol: position.symbol.clone(),
            stop_price: self.calculate_stop_price(position.avg_entry_price)?,
            quantity: position.quantity,
            is_trailing: self.is_trailing(),
        })
    }
}
