//! Spot positions and the paper account that holds them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Side;

/// Spot holding of one asset. Spot accounts cannot go short, so quantity
/// is never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub current_price: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, avg_entry_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price,
            current_price: avg_entry_price,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.avg_entry_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.market_value() - self.cost_basis()
    }

    /// Unrealized P&L in percent of cost basis.
    pub fn unrealized_pnl_percent(&self) -> Decimal {
        let basis = self.cost_basis();
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        self.unrealized_pnl() / basis * Decimal::ONE_HUNDRED
    }

    pub fn update_price(&mut self, price: Decimal) {
        self.current_price = price;
    }

    /// Apply an executed trade and return the P&L realized by it.
    ///
    /// Sells larger than the holding are clamped to the holding.
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        match side {
            Side::Buy => {
                let total = self.quantity + quantity;
                if !total.is_zero() {
                    self.avg_entry_price = (self.cost_basis() + quantity * price) / total;
                }
                self.quantity = total;
                Decimal::ZERO
            }
            Side::Sell => {
                let sold = quantity.min(self.quantity);
                let realized = sold * (price - self.avg_entry_price);
                self.quantity -= sold;
                self.realized_pnl += realized;
                if self.quantity.is_zero() {
                    self.avg_entry_price = Decimal::ZERO;
                }
                realized
            }
        }
    }
}

/// Paper trading account: quote currency cash plus spot positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub equity: Decimal,
    pub positions: HashMap<String, Position>,
    pub total_realized_pnl: Decimal,
    pub total_fees: Decimal,
    pub initial_capital: Decimal,
    pub peak_equity: Decimal,
    /// Equity at the start of the current UTC day, for the daily loss limit.
    pub day_start_equity: Decimal,
}

impl Portfolio {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            equity: initial_capital,
            positions: HashMap::new(),
            total_realized_pnl: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            initial_capital,
            peak_equity: initial_capital,
            day_start_equity: initial_capital,
        }
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| !p.is_flat())
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn total_market_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// Recompute equity and the running peak.
    pub fn update_equity(&mut self) {
        self.equity = self.cash + self.total_market_value();
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
    }

    /// Settle a fill against cash and the position book. Returns realized P&L.
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
    ) -> Decimal {
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol, Decimal::ZERO, Decimal::ZERO));

        let quantity = match side {
            Side::Buy => quantity,
            Side::Sell => quantity.min(position.quantity),
        };
        let notional = quantity * price;
        match side {
            Side::Buy => self.cash -= notional + fee,
            Side::Sell => self.cash += notional - fee,
        }

        let realized = position.apply_fill(side, quantity, price);
        position.update_price(price);
        if position.is_flat() {
            self.positions.remove(symbol);
        }

        self.total_fees += fee;
        self.total_realized_pnl += realized;
        self.update_equity();
        realized
    }

    pub fn update_price(&mut self, symbol: &str, price: Decimal) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.update_price(price);
        }
        self.update_equity();
    }

    /// Drawdown from the equity peak, in percent.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity.is_zero() {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity * Decimal::ONE_HUNDRED
    }

    /// Return on initial capital, in percent.
    pub fn total_return(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.equity - self.initial_capital) / self.initial_capital * Decimal::ONE_HUNDRED
    }

    /// Today's P&L relative to the start-of-day equity.
    pub fn daily_pnl(&self) -> Decimal {
        self.equity - self.day_start_equity
    }

    pub fn start_new_day(&mut self) {
        self.day_start_equity = self.equity;
    }
}
