//! EVM chain client built on alloy.

use crate::units::{from_base_units, to_base_units};
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use chainbot_core::error::ChainError;
use chainbot_core::traits::ChainClient;
use chainbot_core::types::{
    Chain, GasEstimate, NativeBalance, TokenBalance, TransferReceipt, TxStatus, TxStatusReport,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gas limit used for ERC-20 transfers.
pub const TOKEN_TRANSFER_GAS: u64 = 100_000;

const RECEIPT_POLL: Duration = Duration::from_secs(2);

sol! {
    /// Minimal ERC-20 surface.
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Parse a `0x`-prefixed, 40 hex digit address. Checksums are not enforced.
pub fn parse_evm_address(address: &str) -> Result<Address, ChainError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ChainError::InvalidAddress(address.to_string()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainError::InvalidAddress(address.to_string()));
    }
    Address::from_str(trimmed).map_err(|_| ChainError::InvalidAddress(address.to_string()))
}

fn parse_tx_hash(hash: &str) -> Result<B256, ChainError> {
    B256::from_str(hash.trim()).map_err(|_| ChainError::TransactionNotFound(hash.to_string()))
}

fn signer_from_key(private_key: &str) -> Result<PrivateKeySigner, ChainError> {
    let key = private_key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    PrivateKeySigner::from_str(key).map_err(|_| ChainError::InvalidPrivateKey)
}

fn rpc_err(context: &str, e: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(format!("{context}: {e}"))
}

fn positive(amount: Decimal) -> Result<Decimal, ChainError> {
    if amount <= Decimal::ZERO {
        return Err(ChainError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(amount)
}

/// One EVM network reached over HTTP JSON-RPC.
pub struct EvmClient {
    chain: Chain,
    chain_id: u64,
    provider: RootProvider,
    confirmation_timeout: Duration,
}

impl EvmClient {
    pub fn new(chain: Chain, rpc_url: &str, confirmation_timeout: Duration) -> Result<Self, ChainError> {
        let chain_id = chain
            .chain_id()
            .ok_or_else(|| ChainError::UnsupportedChain(chain.to_string()))?;
        let url: Url = rpc_url
            .parse()
            .map_err(|e| ChainError::Rpc(format!("invalid RPC URL {rpc_url}: {e}")))?;
        Ok(Self {
            chain,
            chain_id,
            provider: RootProvider::new_http(url),
            confirmation_timeout,
        })
    }

    fn symbol(&self) -> String {
        self.chain.native_symbol().to_string()
    }

    /// ERC-20 balance with the token's own decimals and symbol.
    pub async fn token_balance(
        &self,
        wallet: &str,
        token: &str,
    ) -> Result<TokenBalance, ChainError> {
        let owner = parse_evm_address(wallet)?;
        let token_addr = parse_evm_address(token)?;
        let contract = IERC20::new(token_addr, self.provider.clone());

        let raw = contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| rpc_err("balanceOf", e))?;
        let decimals = contract
            .decimals()
            .call()
            .await
            .map_err(|e| rpc_err("decimals", e))?;
        let symbol = contract
            .symbol()
            .call()
            .await
            .unwrap_or_else(|_| "UNKNOWN".to_string());

        Ok(TokenBalance {
            chain: self.chain,
            wallet_address: owner.to_string(),
            token_address: token_addr.to_string(),
            symbol,
            decimals,
            balance: from_base_units(raw, decimals),
            raw: raw.to_string(),
        })
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        IERC20::new(token, self.provider.clone())
            .decimals()
            .call()
            .await
            .map_err(|e| rpc_err("decimals", e))
    }

    fn cost(&self, gas_limit: u64, gas_price: u128) -> Decimal {
        let wei = U256::from(gas_limit) * U256::from(gas_price);
        from_base_units(wei, self.chain.native_decimals())
    }

    /// Gas needed for a native transfer and what it costs at the current price.
    pub async fn estimate_native_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<GasEstimate, ChainError> {
        let from = parse_evm_address(from)?;
        let to = parse_evm_address(to)?;
        let value = to_base_units(positive(amount)?, self.chain.native_decimals())?;

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value);
        let gas_limit = self
            .provider
            .estimate_gas(request)
            .await
            .map_err(|e| rpc_err("eth_estimateGas", e))?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_err("eth_gasPrice", e))?;

        Ok(GasEstimate {
            chain: self.chain,
            gas_limit,
            gas_price,
            total_cost: self.cost(gas_limit, gas_price),
            symbol: self.symbol(),
            is_token_transfer: false,
        })
    }

    /// Gas for an ERC-20 `transfer`. Falls back to the fixed token gas limit
    /// when the node cannot simulate the call (e.g. insufficient balance).
    pub async fn estimate_token_transfer(
        &self,
        from: &str,
        token: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<GasEstimate, ChainError> {
        let from = parse_evm_address(from)?;
        let token = parse_evm_address(token)?;
        let to = parse_evm_address(to)?;
        let decimals = self.token_decimals(token).await?;
        let value = to_base_units(positive(amount)?, decimals)?;

        let input = IERC20::transferCall { to, amount: value }.abi_encode();
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(token)
            .with_input(input);
        let gas_limit = match self.provider.estimate_gas(request).await {
            Ok(gas) => gas,
            Err(e) => {
                debug!(chain = %self.chain, error = %e, "token gas estimate failed, using default");
                TOKEN_TRANSFER_GAS
            }
        };
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_err("eth_gasPrice", e))?;

        Ok(GasEstimate {
            chain: self.chain,
            gas_limit,
            gas_price,
            total_cost: self.cost(gas_limit, gas_price),
            symbol: self.symbol(),
            is_token_transfer: true,
        })
    }

    /// Sign and broadcast a native transfer, then wait for its receipt.
    pub async fn send_native(
        &self,
        private_key: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, ChainError> {
        let signer = signer_from_key(private_key)?;
        let from = signer.address();
        let to_addr = parse_evm_address(to)?;
        let value = to_base_units(positive(amount)?, self.chain.native_decimals())?;

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to_addr)
            .with_value(value);
        let gas_limit = self
            .provider
            .estimate_gas(request)
            .await
            .map_err(|e| rpc_err("eth_estimateGas", e))?;

        let (tx_hash, gas_price) = self
            .sign_and_send(&signer, gas_limit, TxKind::Call(to_addr), value, Bytes::new())
            .await?;

        let mut receipt = TransferReceipt {
            chain: self.chain,
            tx_hash: tx_hash.to_string(),
            from: from.to_string(),
            to: to_addr.to_string(),
            amount,
            symbol: self.symbol(),
            token_address: None,
            status: TxStatus::Pending,
            gas_used: None,
            gas_price,
            fee: None,
            block_number: None,
        };
        self.settle(&mut receipt, tx_hash).await;
        Ok(receipt)
    }

    /// Sign and broadcast an ERC-20 transfer with a fixed gas limit.
    pub async fn send_token(
        &self,
        private_key: &str,
        token: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, ChainError> {
        let signer = signer_from_key(private_key)?;
        let from = signer.address();
        let token_addr = parse_evm_address(token)?;
        let to_addr = parse_evm_address(to)?;
        let decimals = self.token_decimals(token_addr).await?;
        let value = to_base_units(positive(amount)?, decimals)?;
        let symbol = IERC20::new(token_addr, self.provider.clone())
            .symbol()
            .call()
            .await
            .unwrap_or_else(|_| "TOKEN".to_string());

        let input = IERC20::transferCall {
            to: to_addr,
            amount: value,
        }
        .abi_encode();
        let (tx_hash, gas_price) = self
            .sign_and_send(
                &signer,
                TOKEN_TRANSFER_GAS,
                TxKind::Call(token_addr),
                U256::ZERO,
                Bytes::from(input),
            )
            .await?;

        let mut receipt = TransferReceipt {
            chain: self.chain,
            tx_hash: tx_hash.to_string(),
            from: from.to_string(),
            to: to_addr.to_string(),
            amount,
            symbol,
            token_address: Some(token_addr.to_string()),
            status: TxStatus::Pending,
            gas_used: None,
            gas_price,
            fee: None,
            block_number: None,
        };
        self.settle(&mut receipt, tx_hash).await;
        Ok(receipt)
    }

    /// Build a legacy transaction at the current gas price and pending
    /// nonce, sign it locally and broadcast the raw bytes.
    async fn sign_and_send(
        &self,
        signer: &PrivateKeySigner,
        gas_limit: u64,
        to: TxKind,
        value: U256,
        input: Bytes,
    ) -> Result<(B256, u128), ChainError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_err("eth_gasPrice", e))?;
        let nonce = self
            .provider
            .get_transaction_count(signer.address())
            .pending()
            .await
            .map_err(|e| rpc_err("eth_getTransactionCount", e))?;

        let tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            input,
        };
        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| ChainError::Transaction(format!("signing failed: {e}")))?;
        let raw = TxEnvelope::Legacy(tx.into_signed(signature)).encoded_2718();

        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| ChainError::Transaction(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        info!(chain = %self.chain, tx_hash = %tx_hash, nonce, gas_limit, "transaction broadcast");
        Ok((tx_hash, gas_price))
    }

    /// Poll for the receipt until the confirmation timeout. A transaction
    /// still unmined at the deadline stays pending.
    async fn settle(&self, receipt: &mut TransferReceipt, tx_hash: B256) {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(r)) => {
                    receipt.status = receipt_status(&r);
                    receipt.gas_used = Some(r.gas_used);
                    receipt.block_number = r.block_number;
                    receipt.fee = Some(self.cost(r.gas_used, r.effective_gas_price));
                    info!(
                        chain = %self.chain,
                        tx_hash = %tx_hash,
                        status = %receipt.status,
                        gas_used = r.gas_used,
                        "transaction mined"
                    );
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!(chain = %self.chain, tx_hash = %tx_hash, error = %e, "receipt poll failed"),
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(chain = %self.chain, tx_hash = %tx_hash, "no receipt before timeout");
                return;
            }
            tokio::time::sleep(RECEIPT_POLL).await;
        }
    }
}

fn receipt_status(receipt: &TransactionReceipt) -> TxStatus {
    if receipt.status() {
        TxStatus::Confirmed
    } else {
        TxStatus::Failed
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    fn chain(&self) -> Chain {
        self.chain
    }

    fn validate_address(&self, address: &str) -> Result<(), ChainError> {
        parse_evm_address(address).map(|_| ())
    }

    async fn native_balance(&self, address: &str) -> Result<NativeBalance, ChainError> {
        let owner = parse_evm_address(address)?;
        let raw = self
            .provider
            .get_balance(owner)
            .await
            .map_err(|e| rpc_err("eth_getBalance", e))?;
        Ok(NativeBalance {
            chain: self.chain,
            address: owner.to_string(),
            symbol: self.symbol(),
            balance: from_base_units(raw, self.chain.native_decimals()),
            raw: raw.to_string(),
        })
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatusReport, ChainError> {
        let hash = parse_tx_hash(tx_hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| rpc_err("eth_getTransactionReceipt", e))?
            .ok_or_else(|| ChainError::TransactionNotFound(tx_hash.to_string()))?;
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| rpc_err("eth_blockNumber", e))?;

        let confirmations = receipt
            .block_number
            .map(|b| latest.saturating_sub(b))
            .unwrap_or(0);
        Ok(TxStatusReport {
            chain: self.chain,
            tx_hash: hash.to_string(),
            status: receipt_status(&receipt),
            block_number: receipt.block_number,
            confirmations,
            gas_used: Some(receipt.gas_used),
            effective_gas_price: Some(receipt.effective_gas_price),
            fee: Some(self.cost(receipt.gas_used, receipt.effective_gas_price)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_parse_address() {
        let addr = parse_evm_address("0x52908400098527886e0f7030069857d2e4169ee7").unwrap();
        assert_eq!(addr.to_string(), "0x52908400098527886E0F7030069857D2E4169EE7");
        assert!(parse_evm_address("52908400098527886e0f7030069857d2e4169ee7").is_err());
        assert!(parse_evm_address("0x1234").is_err());
        assert!(parse_evm_address("0xZZ908400098527886e0f7030069857d2e4169ee7").is_err());
    }

    #[test]
    fn test_signer_accepts_optional_prefix() {
        let with = signer_from_key(KEY).unwrap();
        let without = signer_from_key(&KEY[2..]).unwrap();
        assert_eq!(with.address(), without.address());
        assert!(matches!(signer_from_key("0x1234"), Err(ChainError::InvalidPrivateKey)));
    }

    #[test]
    fn test_transfer_calldata() {
        let to = parse_evm_address("0x52908400098527886e0f7030069857d2e4169ee7").unwrap();
        let data = IERC20::transferCall {
            to,
            amount: U256::from(1_000_000u64),
        }
        .abi_encode();
        // selector + two 32-byte words
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
    }

    #[test]
    fn test_new_rejects_solana() {
        assert!(EvmClient::new(Chain::Solana, "http://localhost:8545", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_cost_in_native_units() {
        let client =
            EvmClient::new(Chain::Ethereum, "http://localhost:8545", Duration::from_secs(1)).unwrap();
        // 21000 gas at 20 gwei
        assert_eq!(
            client.cost(21_000, 20_000_000_000),
            Decimal::from_str("0.00042").unwrap()
        );
        assert!(client.validate_address("0xabc").is_err());
    }
}
