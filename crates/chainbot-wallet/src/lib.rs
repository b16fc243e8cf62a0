//! Wallet custody for bot users.
//!
//! Private keys are validated, turned into addresses, encrypted with the
//! bot's Fernet key and only decrypted to sign a transfer.

mod error;
mod keys;
mod manager;
mod vault;

pub use error::{WalletError, WalletResult};
pub use keys::{derive_address, validate_private_key};
pub use manager::{
    AddedWallet, DepositInfo, WalletBalance, WalletInfo, WalletManager, MAX_SLIPPAGE_PCT,
};
pub use vault::KeyVault;
