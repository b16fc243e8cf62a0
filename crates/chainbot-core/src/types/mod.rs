//! Shared data types.

mod chain;
mod ohlcv;
mod order;
mod position;
mod signal;
mod timeframe;

pub use chain::{
    Chain, GasEstimate, NativeBalance, TokenBalance, TransferReceipt, TxStatus, TxStatusReport,
};
pub use ohlcv::{Bar, BarSeries};
pub use order::{Fill, Order, OrderRequest, OrderStatus, OrderType, Side};
pub use position::{Portfolio, Position};
pub use signal::{Signal, SignalMetadata, SignalStrength, SignalType};
pub use timeframe::Timeframe;
