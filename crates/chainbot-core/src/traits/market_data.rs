//! Market data source trait.

use crate::error::DataError;
use crate::types::{Bar, Timeframe};
use async_trait::async_trait;

/// Source of closed candles and spot prices.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Up to `limit` most recent closed candles, oldest first.
    async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, DataError>;

    async fn latest_price(&self, symbol: &str) -> Result<f64, DataError>;

    fn name(&self) -> &str;
}
