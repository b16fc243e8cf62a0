//! Solana read access over JSON-RPC.

use crate::units::lamports_to_sol;
use async_trait::async_trait;
use chainbot_core::error::ChainError;
use chainbot_core::traits::ChainClient;
use chainbot_core::types::{Chain, NativeBalance, TxStatus, TxStatusReport};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Solana account addresses are base58 encoded 32-byte public keys.
pub fn validate_solana_address(address: &str) -> Result<(), ChainError> {
    let address = address.trim();
    if !(32..=44).contains(&address.len()) {
        return Err(ChainError::InvalidAddress(address.to_string()));
    }
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(ChainError::InvalidAddress(address.to_string())),
    }
}

/// Solana client. Reads balances and transaction status; sending SOL is
/// not supported.
pub struct SolanaClient {
    client: reqwest::Client,
    rpc_url: String,
}

impl SolanaClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::Rpc(format!("{method}: HTTP {status}")));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method}: {e}")))?;
        debug!(method, "solana rpc ok");
        rpc_result(method, value)
    }
}

fn rpc_result(method: &str, mut value: Value) -> Result<Value, ChainError> {
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ChainError::Rpc(format!("{method}: {message}")));
    }
    Ok(value.get_mut("result").map(Value::take).unwrap_or(Value::Null))
}

fn parse_balance(address: &str, result: &Value) -> Result<NativeBalance, ChainError> {
    let lamports = result
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| ChainError::Rpc("getBalance: missing value".into()))?;
    Ok(NativeBalance {
        chain: Chain::Solana,
        address: address.to_string(),
        symbol: Chain::Solana.native_symbol().to_string(),
        balance: lamports_to_sol(lamports),
        raw: lamports.to_string(),
    })
}

fn parse_transaction(signature: &str, result: &Value) -> Result<TxStatusReport, ChainError> {
    if result.is_null() {
        return Err(ChainError::TransactionNotFound(signature.to_string()));
    }
    let meta = result.get("meta");
    let failed = meta
        .and_then(|m| m.get("err"))
        .is_some_and(|e| !e.is_null());
    let fee = meta
        .and_then(|m| m.get("fee"))
        .and_then(Value::as_u64)
        .map(lamports_to_sol);

    Ok(TxStatusReport {
        chain: Chain::Solana,
        tx_hash: signature.to_string(),
        status: if failed {
            TxStatus::Failed
        } else {
            TxStatus::Confirmed
        },
        block_number: result.get("slot").and_then(Value::as_u64),
        // Finality is per slot; a returned transaction counts once.
        confirmations: 1,
        gas_used: None,
        effective_gas_price: None,
        fee,
    })
}

#[async_trait]
impl ChainClient for SolanaClient {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn validate_address(&self, address: &str) -> Result<(), ChainError> {
        validate_solana_address(address)
    }

    async fn native_balance(&self, address: &str) -> Result<NativeBalance, ChainError> {
        validate_solana_address(address)?;
        let result = self.rpc("getBalance", json!([address])).await?;
        parse_balance(address, &result)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatusReport, ChainError> {
        let result = self
            .rpc(
                "getTransaction",
                json!([tx_hash, {"encoding": "json", "maxSupportedTransactionVersion": 0}]),
            )
            .await?;
        parse_transaction(tx_hash, &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_address() {
        assert!(validate_solana_address("11111111111111111111111111111111").is_ok());
        assert!(validate_solana_address("So11111111111111111111111111111111111111112").is_ok());
        assert!(validate_solana_address("0x52908400098527886e0f7030069857d2e4169ee7").is_err());
        assert!(validate_solana_address("short").is_err());
    }

    #[test]
    fn test_address_must_be_base58_of_32_bytes() {
        // Right length, but 0, O, I and l are outside the alphabet.
        assert!(validate_solana_address("0OIl1111111111111111111111111111").is_err());
        // Valid base58 that decodes to 33 bytes.
        assert!(validate_solana_address("111111111111111111111111111111111").is_err());
    }

    #[test]
    fn test_parse_balance() {
        let result = json!({"context": {"slot": 1}, "value": 2_500_000_000u64});
        let balance = parse_balance("addr", &result).unwrap();
        assert_eq!(balance.balance, dec!(2.5));
        assert_eq!(balance.symbol, "SOL");
        assert_eq!(balance.raw, "2500000000");
    }

    #[test]
    fn test_parse_transaction() {
        let ok = json!({"slot": 250, "meta": {"err": null, "fee": 5000}});
        let report = parse_transaction("sig", &ok).unwrap();
        assert_eq!(report.status, TxStatus::Confirmed);
        assert_eq!(report.block_number, Some(250));
        assert_eq!(report.confirmations, 1);
        assert_eq!(report.fee, Some(dec!(0.000005)));

        let failed = json!({"slot": 251, "meta": {"err": {"InstructionError": [0, "Custom"]}, "fee": 5000}});
        assert_eq!(parse_transaction("sig", &failed).unwrap().status, TxStatus::Failed);

        assert!(matches!(
            parse_transaction("sig", &Value::Null),
            Err(ChainError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_rpc_error_is_surfaced() {
        let value = json!({"jsonrpc": "2.0", "error": {"code": -32602, "message": "Invalid param"}, "id": 1});
        assert!(rpc_result("getBalance", value).is_err());
    }
}
