//! Technical indicators for the built-in strategies.
//!
//! - Moving averages: SMA, EMA and a streaming EMA
//! - Momentum: RSI (Wilder)
//! - Volatility: ATR (Wilder)
//!
//! Batch indicators return one value per input position once the period is
//! filled, so `output.last()` always belongs to the latest candle.

pub mod momentum;
pub mod moving_average;
pub mod volatility;

pub use momentum::{Rsi, StreamingRsi};
pub use moving_average::{Ema, Sma, StreamingEma};
pub use volatility::Atr;
