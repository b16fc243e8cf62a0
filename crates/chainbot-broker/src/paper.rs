//! Paper trading broker.

use async_trait::async_trait;
use chainbot_core::error::BrokerError;
use chainbot_core::traits::Broker;
use chainbot_core::types::{Fill, Order, OrderRequest, OrderType, Portfolio, Position, Side};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Execution costs of a paper account. Percentages are of notional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_capital: Decimal,
    pub slippage_pct: Decimal,
    pub fee_pct: Decimal,
    /// Fills whose slippage exceeds this are refused.
    pub max_slippage_pct: Option<Decimal>,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            slippage_pct: dec!(0.05),
            fee_pct: dec!(0.1),
            max_slippage_pct: None,
        }
    }
}

struct BookState {
    portfolio: Portfolio,
    orders: HashMap<Uuid, Order>,
    prices: HashMap<String, Decimal>,
}

/// Simulated broker. Market orders fill at the last known price with
/// slippage against the taker; limit and stop orders rest until a price
/// update lets them fill.
pub struct PaperBroker {
    state: Mutex<BookState>,
    config: PaperConfig,
}

impl PaperBroker {
    pub fn new(config: PaperConfig) -> Self {
        Self {
            state: Mutex::new(BookState {
                portfolio: Portfolio::new(config.initial_capital),
                orders: HashMap::new(),
                prices: HashMap::new(),
            }),
            config,
        }
    }

    pub fn with_capital(initial_capital: Decimal) -> Self {
        Self::new(PaperConfig {
            initial_capital,
            ..PaperConfig::default()
        })
    }

    pub fn config(&self) -> &PaperConfig {
        &self.config
    }

    /// Fill a pending order at `market_price`.
    ///
    /// Terminal orders are returned unchanged. A limit order whose limit the
    /// slipped price would cross stays pending.
    pub async fn execute_at_price(
        &self,
        order_id: Uuid,
        market_price: Decimal,
    ) -> Result<Order, BrokerError> {
        let mut state = self.state.lock().await;
        self.execute_locked(&mut state, order_id, market_price)
    }

    fn execute_locked(
        &self,
        state: &mut BookState,
        order_id: Uuid,
        market_price: Decimal,
    ) -> Result<Order, BrokerError> {
        let BookState {
            portfolio, orders, ..
        } = state;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Ok(order.clone());
        }
        if market_price <= Decimal::ZERO {
            return Err(BrokerError::NoPrice(order.symbol.clone()));
        }

        if let Some(max) = self.config.max_slippage_pct {
            if self.config.slippage_pct > max {
                order.reject(format!(
                    "slippage {}% exceeds max {}%",
                    self.config.slippage_pct, max
                ));
                return Err(BrokerError::SlippageExceeded {
                    actual: self.config.slippage_pct,
                    max,
                });
            }
        }

        let slip = self.config.slippage_pct / Decimal::ONE_HUNDRED;
        let fill_price = match order.side {
            Side::Buy => market_price * (Decimal::ONE + slip),
            Side::Sell => market_price * (Decimal::ONE - slip),
        };

        if order.order_type == OrderType::Limit {
            if let Some(limit) = order.limit_price {
                let crosses = match order.side {
                    Side::Buy => fill_price > limit,
                    Side::Sell => fill_price < limit,
                };
                if crosses {
                    return Ok(order.clone());
                }
            }
        }

        let quantity = match order.side {
            Side::Buy => order.remaining_quantity(),
            Side::Sell => {
                let held = portfolio
                    .get_position(&order.symbol)
                    .map(|p| p.quantity)
                    .unwrap_or_default();
                if held <= Decimal::ZERO {
                    order.reject("no position to sell");
                    return Err(BrokerError::PositionNotFound(order.symbol.clone()));
                }
                order.remaining_quantity().min(held)
            }
        };

        let notional = fill_price * quantity;
        let fee = notional * self.config.fee_pct / Decimal::ONE_HUNDRED;

        if order.side == Side::Buy && notional + fee > portfolio.cash {
            order.reject("insufficient funds");
            warn!(symbol = %order.symbol, required = %(notional + fee), cash = %portfolio.cash, "paper buy rejected");
            return Err(BrokerError::InsufficientFunds {
                required: notional + fee,
                available: portfolio.cash,
            });
        }

        let fill = Fill {
            order_id,
            quantity,
            price: fill_price,
            fee,
            slippage_pct: self.config.slippage_pct,
            timestamp: Utc::now(),
        };
        // A sell clamped to the holding is complete.
        if order.side == Side::Sell {
            order.quantity = order.filled_quantity + quantity;
        }
        order.add_fill(&fill);

        portfolio.apply_fill(&order.symbol, order.side, quantity, fill_price, fee);
        debug!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = %quantity,
            price = %fill_price,
            fee = %fee,
            "paper fill"
        );
        Ok(order.clone())
    }

    /// Record the latest price of `symbol`, mark positions and try resting orders.
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        let mut prices = HashMap::with_capacity(1);
        prices.insert(symbol.to_string(), price);
        self.update_prices(&prices).await;
    }

    /// Mark every listed symbol to market and fill resting orders the new
    /// prices allow.
    pub async fn update_prices(&self, prices: &HashMap<String, Decimal>) {
        let mut state = self.state.lock().await;
        for (symbol, price) in prices {
            state.prices.insert(symbol.clone(), *price);
            state.portfolio.update_price(symbol, *price);
        }

        let ready: Vec<(Uuid, Decimal)> = state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .filter_map(|o| {
                let price = *prices.get(&o.symbol)?;
                let triggered = match (o.order_type, o.stop_price) {
                    (OrderType::Stop, Some(stop)) => match o.side {
                        Side::Sell => price <= stop,
                        Side::Buy => price >= stop,
                    },
                    (OrderType::Stop, None) => false,
                    _ => true,
                };
                triggered.then_some((o.id, price))
            })
            .collect();

        for (id, price) in ready {
            if let Err(e) = self.execute_locked(&mut state, id, price) {
                warn!(order_id = %id, error = %e, "resting order rejected");
            }
        }
    }

    pub async fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().await.prices.get(symbol).copied()
    }

    pub async fn portfolio_snapshot(&self) -> Portfolio {
        self.state.lock().await.portfolio.clone()
    }

    /// Roll the daily loss baseline.
    pub async fn start_new_day(&self) {
        self.state.lock().await.portfolio.start_new_day();
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn get_account(&self) -> Result<Portfolio, BrokerError> {
        Ok(self.portfolio_snapshot().await)
    }

    async fn submit_order(&self, request: OrderRequest) -> Result<Order, BrokerError> {
        if request.quantity <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        let order = Order::from_request(&request);
        let order_id = order.id;

        let mut state = self.state.lock().await;
        state.orders.insert(order_id, order.clone());

        let price = state.prices.get(&order.symbol).copied();
        match (order.order_type, price) {
            (OrderType::Market, None) => {
                if let Some(o) = state.orders.get_mut(&order_id) {
                    o.reject("no market price");
                }
                Err(BrokerError::NoPrice(order.symbol))
            }
            (OrderType::Stop, _) | (_, None) => Ok(order),
            (_, Some(price)) => self.execute_locked(&mut state, order_id, price),
        }
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let id = Uuid::parse_str(order_id)
            .map_err(|_| BrokerError::OrderNotFound(order_id.to_string()))?;

        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(BrokerError::OrderRejected(format!(
                "order {order_id} is already {:?}",
                order.status
            )));
        }
        order.status = chainbot_core::types::OrderStatus::Canceled;
        info!(order_id, "paper order canceled");
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        let id = Uuid::parse_str(order_id)
            .map_err(|_| BrokerError::OrderNotFound(order_id.to_string()))?;
        self.state
            .lock()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound(order_id.to_string()))
    }

    async fn get_open_orders(&self) -> Result<Vec<Order>, BrokerError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let state = self.state.lock().await;
        Ok(state.portfolio.positions.values().cloned().collect())
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError> {
        let state = self.state.lock().await;
        Ok(state.portfolio.get_position(symbol).cloned())
    }

    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError> {
        let quantity = {
            let state = self.state.lock().await;
            state
                .portfolio
                .get_position(symbol)
                .map(|p| p.quantity)
                .ok_or_else(|| BrokerError::PositionNotFound(symbol.to_string()))?
        };
        self.submit_order(OrderRequest::market(symbol, Side::Sell, quantity))
            .await
    }

    async fn close_all_positions(&self) -> Result<Vec<Order>, BrokerError> {
        let symbols: Vec<String> = {
            let state = self.state.lock().await;
            state.portfolio.positions.keys().cloned().collect()
        };

        let mut orders = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            orders.push(self.close_position(&symbol).await?);
        }
        Ok(orders)
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbot_core::types::OrderStatus;

    fn broker() -> PaperBroker {
        PaperBroker::new(PaperConfig {
            initial_capital: dec!(10000),
            slippage_pct: Decimal::ZERO,
            fee_pct: Decimal::ZERO,
            max_slippage_pct: None,
        })
    }

    #[tokio::test]
    async fn test_market_buy_fills_at_last_price() {
        let broker = broker();
        broker.set_price("ETH", dec!(2000)).await;

        let order = broker
            .submit_order(OrderRequest::market("ETH", Side::Buy, dec!(1.5)))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_avg_price, Some(dec!(2000)));
        let account = broker.get_account().await.unwrap();
        assert_eq!(account.cash, dec!(7000));
        assert_eq!(account.get_position("ETH").unwrap().quantity, dec!(1.5));
    }

    #[tokio::test]
    async fn test_market_order_without_price() {
        let broker = broker();
        let err = broker
            .submit_order(OrderRequest::market("ETH", Side::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::NoPrice(_)));
    }

    #[tokio::test]
    async fn test_fee_and_slippage() {
        let broker = PaperBroker::new(PaperConfig {
            initial_capital: dec!(10000),
            slippage_pct: dec!(1),
            fee_pct: dec!(0.5),
            max_slippage_pct: None,
        });
        broker.set_price("SOL", dec!(100)).await;

        let order = broker
            .submit_order(OrderRequest::market("SOL", Side::Buy, dec!(10)))
            .await
            .unwrap();

        assert_eq!(order.filled_avg_price, Some(dec!(101)));
        assert_eq!(order.fees, dec!(5.05));
        let account = broker.get_account().await.unwrap();
        assert_eq!(account.cash, dec!(10000) - dec!(1010) - dec!(5.05));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let broker = broker();
        broker.set_price("ETH", dec!(2000)).await;

        let err = broker
            .submit_order(OrderRequest::market("ETH", Side::Buy, dec!(6)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientFunds { .. }));
        assert_eq!(broker.get_account().await.unwrap().cash, dec!(10000));
    }

    #[tokio::test]
    async fn test_slippage_above_user_max_is_refused() {
        let broker = PaperBroker::new(PaperConfig {
            slippage_pct: dec!(2),
            max_slippage_pct: Some(dec!(1)),
            ..PaperConfig::default()
        });
        broker.set_price("ETH", dec!(2000)).await;

        let err = broker
            .submit_order(OrderRequest::market("ETH", Side::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::SlippageExceeded { .. }));
    }

    #[tokio::test]
    async fn test_limit_order_waits_for_price() {
        let broker = broker();
        broker.set_price("ETH", dec!(2100)).await;

        let order = broker
            .submit_order(OrderRequest::limit("ETH", Side::Buy, dec!(1), dec!(2000)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(broker.get_open_orders().await.unwrap().len(), 1);

        broker.set_price("ETH", dec!(1990)).await;
        let order = broker.get_order(&order.id.to_string()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_avg_price, Some(dec!(1990)));
    }

    #[tokio::test]
    async fn test_close_position_realizes_pnl() {
        let broker = broker();
        broker.set_price("ETH", dec!(2000)).await;
        broker
            .submit_order(OrderRequest::market("ETH", Side::Buy, dec!(2)))
            .await
            .unwrap();

        broker.set_price("ETH", dec!(2100)).await;
        let close = broker.close_position("ETH").await.unwrap();
        assert!(close.is_filled());

        let account = broker.get_account().await.unwrap();
        assert!(account.positions.is_empty());
        assert_eq!(account.cash, dec!(10200));
        assert_eq!(account.total_realized_pnl, dec!(200));
    }

    #[tokio::test]
    async fn test_cancel_order() {
        let broker = broker();
        let order = broker
            .submit_order(OrderRequest::limit("ETH", Side::Buy, dec!(1), dec!(1000)))
            .await
            .unwrap();

        broker.cancel_order(&order.id.to_string()).await.unwrap();
        assert!(broker.get_open_orders().await.unwrap().is_empty());
        assert!(broker.cancel_order(&order.id.to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_pending_limit_fills_on_later_price() {
        let broker = broker();
        let order = broker
            .submit_order(OrderRequest::limit("ETH", Side::Buy, dec!(2), dec!(1000)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let still = broker.execute_at_price(order.id, dec!(1100)).await.unwrap();
        assert_eq!(still.status, OrderStatus::Pending);

        let filled = broker.execute_at_price(order.id, dec!(950)).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        let position = broker.get_position("ETH").await.unwrap().unwrap();
        assert_eq!(position.quantity, dec!(2));
    }

    #[tokio::test]
    async fn test_close_missing_position() {
        let broker = broker();
        assert!(matches!(
            broker.close_position("ETH").await,
            Err(BrokerError::PositionNotFound(_))
        ));
    }
}
