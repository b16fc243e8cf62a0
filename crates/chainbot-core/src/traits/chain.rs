//! Read access to a blockchain.

use crate::error::ChainError;
use crate::types::{Chain, NativeBalance, TxStatusReport};
use async_trait::async_trait;

/// Operations every supported chain offers, EVM or not.
///
/// Sending funds is chain family specific and lives on the concrete clients.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> Chain;

    fn validate_address(&self, address: &str) -> Result<(), ChainError>;

    async fn native_balance(&self, address: &str) -> Result<NativeBalance, ChainError>;

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatusReport, ChainError>;
}
