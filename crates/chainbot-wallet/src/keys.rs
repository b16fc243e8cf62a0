//! Private key checks and address derivation.

use crate::error::{WalletError, WalletResult};
use alloy::signers::local::PrivateKeySigner;
use chainbot_core::types::Chain;
use std::str::FromStr;

/// Check the key shape for `chain` and return it without the `0x` prefix.
///
/// Only EVM keys can be imported: 64 hex characters, optionally prefixed.
pub fn validate_private_key(private_key: &str, chain: Chain) -> WalletResult<String> {
    if !chain.is_evm() {
        return Err(WalletError::UnsupportedChain(chain));
    }
    let key = private_key.trim();
    let key = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    if key.len() != 64 || hex::decode(key).is_err() {
        return Err(WalletError::InvalidPrivateKey);
    }
    Ok(key.to_lowercase())
}

/// Checksummed address for an EVM private key.
pub fn derive_address(private_key: &str) -> WalletResult<String> {
    let key = private_key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    let signer = PrivateKeySigner::from_str(key).map_err(|_| WalletError::InvalidPrivateKey)?;
    Ok(signer.address().to_checksum(None))
}
