use chainbot_core::error::ChainError;
use chainbot_core::types::Chain;
use chainbot_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Could not decrypt the stored key")]
    Decryption,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Wallet import is not supported on {0}")]
    UnsupportedChain(Chain),

    #[error("Wallet '{name}' already exists on {chain}")]
    DuplicateWallet { name: String, chain: Chain },

    #[error("Wallet '{name}' not found on {chain}")]
    WalletNotFound { name: String, chain: Chain },

    #[error("Invalid wallet name: {0}")]
    InvalidName(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WalletResult<T> = Result<T, WalletError>;
