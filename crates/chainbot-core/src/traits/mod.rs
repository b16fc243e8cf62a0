//! Core traits.

mod broker;
mod chain;
mod indicator;
mod market_data;
mod notifier;
mod strategy;

pub use broker::Broker;
pub use chain::ChainClient;
pub use indicator::{Indicator, StreamingIndicator};
pub use market_data::MarketData;
pub use notifier::Notifier;
pub use strategy::{Strategy, StrategyConfig, StrategyState};
