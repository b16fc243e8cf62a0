//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{Order, OrderRequest, Portfolio, Position};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Order execution venue for strategy jobs.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn get_account(&self) -> Result<Portfolio, BrokerError>;

    /// Submit an order. Market orders fill immediately at the last known
    /// price; the returned order carries the final status.
    async fn submit_order(&self, request: OrderRequest) -> Result<Order, BrokerError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError>;

    async fn get_open_orders(&self) -> Result<Vec<Order>, BrokerError>;

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>, BrokerError>;

    /// Sell the whole holding of `symbol` at market.
    async fn close_position(&self, symbol: &str) -> Result<Order, BrokerError>;

    async fn close_all_positions(&self) -> Result<Vec<Order>, BrokerError>;

    async fn get_buying_power(&self) -> Result<Decimal, BrokerError> {
        Ok(self.get_account().await?.cash)
    }

    fn name(&self) -> &str;
}
