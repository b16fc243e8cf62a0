//! Supported blockchains and the reports chain clients return.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Base,
    Bsc,
    Polygon,
    Solana,
}

impl Chain {
    pub const ALL: [Chain; 5] = [
        Chain::Ethereum,
        Chain::Base,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Solana,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Base => "base",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Solana => "solana",
        }
    }

    /// Ticker of the gas token.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Base => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "MATIC",
            Chain::Solana => "SOL",
        }
    }

    pub fn native_decimals(&self) -> u8 {
        match self {
            Chain::Solana => 9,
            _ => 18,
        }
    }

    /// EIP-155 chain id, `None` for non-EVM chains.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Base => Some(8453),
            Chain::Bsc => Some(56),
            Chain::Polygon => Some(137),
            Chain::Solana => None,
        }
    }

    pub fn is_evm(&self) -> bool {
        self.chain_id().is_some()
    }

    /// Block explorer link for a transaction.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        let base = match self {
            Chain::Ethereum => "https://etherscan.io/tx/",
            Chain::Base => "https://basescan.org/tx/",
            Chain::Bsc => "https://bscscan.com/tx/",
            Chain::Polygon => "https://polygonscan.com/tx/",
            Chain::Solana => "https://solscan.io/tx/",
        };
        format!("{base}{tx_hash}")
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            "bsc" | "bnb" | "binance" => Ok(Chain::Bsc),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "solana" | "sol" => Ok(Chain::Solana),
            other => Err(format!(
                "Unsupported chain: {other} (expected ethereum, base, bsc, polygon or solana)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "sent" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            other => Err(format!("Unknown transaction status: {other}")),
        }
    }
}

/// Gas token balance of an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeBalance {
    pub chain: Chain,
    pub address: String,
    pub symbol: String,
    pub balance: Decimal,
    /// Smallest unit (wei or lamports) as a decimal string.
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub chain: Chain,
    pub wallet_address: String,
    pub token_address: String,
    pub symbol: String,
    pub decimals: u8,
    pub balance: Decimal,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasEstimate {
    pub chain: Chain,
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    /// `gas_limit * gas_price` in native units.
    pub total_cost: Decimal,
    pub symbol: String,
    pub is_token_transfer: bool,
}

/// Outcome of a broadcast transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub chain: Chain,
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    /// Asset symbol that moved (native or token).
    pub symbol: String,
    pub token_address: Option<String>,
    pub status: TxStatus,
    pub gas_used: Option<u64>,
    pub gas_price: u128,
    /// Fee paid in native units, when the receipt is known.
    pub fee: Option<Decimal>,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusReport {
    pub chain: Chain,
    pub tx_hash: String,
    pub status: TxStatus,
    /// Block number (EVM) or slot (Solana).
    pub block_number: Option<u64>,
    pub confirmations: u64,
    pub gas_used: Option<u64>,
    pub effective_gas_price: Option<u128>,
    /// Fee in native units.
    pub fee: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_aliases() {
        assert_eq!("ETH".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert_eq!("bnb".parse::<Chain>().unwrap(), Chain::Bsc);
        assert_eq!("Matic".parse::<Chain>().unwrap(), Chain::Polygon);
        assert_eq!(" sol ".parse::<Chain>().unwrap(), Chain::Solana);
        assert!("avalanche".parse::<Chain>().is_err());
    }

    #[test]
    fn test_chain_properties() {
        assert_eq!(Chain::Base.native_symbol(), "ETH");
        assert_eq!(Chain::Base.chain_id(), Some(8453));
        assert_eq!(Chain::Solana.native_decimals(), 9);
        assert!(!Chain::Solana.is_evm());
        assert!(Chain::ALL.iter().filter(|c| c.is_evm()).count() == 4);
        for chain in Chain::ALL {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
        }
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(
            Chain::Polygon.explorer_tx_url("0xabc"),
            "https://polygonscan.com/tx/0xabc"
        );
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("sent".parse::<TxStatus>().unwrap(), TxStatus::Pending);
        assert_eq!(TxStatus::Failed.to_string(), "failed");
    }
}
