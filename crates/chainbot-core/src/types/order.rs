//! Paper order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("Invalid side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    /// Fills at the limit price or better.
    Limit,
    /// Becomes a market order once the stop price trades.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// What a strategy job asks the broker to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Base asset amount; fractional for crypto.
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            client_order_id: None,
        }
    }

    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Decimal, limit_price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn stop(symbol: impl Into<String>, side: Side, quantity: Decimal, stop_price: Decimal) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

/// Execution of (part of) an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: Uuid,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Fee charged in quote currency.
    pub fee: Decimal,
    /// Difference between the reference price and the fill price, in percent.
    pub slippage_pct: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub fees: Decimal,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
}

impl Order {
    pub fn from_request(request: &OrderRequest) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            client_order_id: request
                .client_order_id
                .clone()
                .unwrap_or_else(|| id.to_string()),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            status: OrderStatus::Pending,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: None,
            fees: Decimal::ZERO,
            created_at: Utc::now(),
            filled_at: None,
            reject_reason: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    /// Notional value of the filled part.
    pub fn value(&self) -> Option<Decimal> {
        self.filled_avg_price.map(|p| p * self.filled_quantity)
    }

    /// Record a fill, averaging the price over all fills.
    pub fn add_fill(&mut self, fill: &Fill) {
        let prev_value = self.filled_avg_price.unwrap_or_default() * self.filled_quantity;
        let total_qty = self.filled_quantity + fill.quantity;
        if total_qty > Decimal::ZERO {
            self.filled_avg_price = Some((prev_value + fill.price * fill.quantity) / total_qty);
        }
        self.filled_quantity = total_qty;
        self.fees += fill.fee;
        if self.filled_quantity >= self.quantity {
            self.status = OrderStatus::Filled;
            self.filled_at = Some(fill.timestamp);
        }
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(order: &Order, qty: Decimal, price: Decimal) -> Fill {
        Fill {
            order_id: order.id,
            quantity: qty,
            price,
            fee: dec!(0.1),
            slippage_pct: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_limit_request() {
        let req = OrderRequest::limit("ETH", Side::Sell, dec!(0.5), dec!(3000));
        assert_eq!(req.order_type, OrderType::Limit);
        assert_eq!(req.limit_price, Some(dec!(3000)));
        assert!(req.stop_price.is_none());
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut order = Order::from_request(&OrderRequest::market("ETH", Side::Buy, dec!(1)));
        assert_eq!(order.status, OrderStatus::Pending);

        let first = fill(&order, dec!(0.4), dec!(2000));
        order.add_fill(&first);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.remaining_quantity(), dec!(0.6));

        let second = fill(&order, dec!(0.6), dec!(2100));
        order.add_fill(&second);
        assert!(order.is_filled());
        assert_eq!(order.filled_avg_price, Some(dec!(2060)));
        assert_eq!(order.fees, dec!(0.2));
    }

    #[test]
    fn test_reject() {
        let mut order = Order::from_request(&OrderRequest::market("SOL", Side::Buy, dec!(3)));
        order.reject("too much slippage");
        assert!(order.status.is_terminal());
        assert_eq!(order.reject_reason.as_deref(), Some("too much slippage"));
    }
}
