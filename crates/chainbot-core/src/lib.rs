//! Shared building blocks for chainbot.
//!
//! - candle, order, position and signal types used by the trading engine
//! - chain identifiers and the reports returned by chain clients
//! - the traits other crates implement: strategies, indicators, brokers,
//!   market data sources, chain clients and notifiers
//! - the error taxonomy

pub mod error;
pub mod traits;
pub mod types;

pub use error::{BotError, BotResult};
pub use traits::*;
pub use types::*;
