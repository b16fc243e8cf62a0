//! Blockchain access.
//!
//! EVM chains (Ethereum, Base, BSC, Polygon) go through alloy HTTP
//! providers; Solana is read over plain JSON-RPC.

mod clients;
mod evm;
mod solana;
pub mod units;

pub use clients::{ChainClients, ClientOptions};
pub use evm::{parse_evm_address, EvmClient, TOKEN_TRANSFER_GAS};
pub use solana::{validate_solana_address, SolanaClient};
