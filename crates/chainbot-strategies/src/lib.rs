//! Built-in strategies.
//!
//! - 7 EMA crossover: price crossing a short EMA
//! - Low RSI: buy oversold, sell once RSI recovers
//! - 200 EMA breakout: close breaking above the long trend line
//!
//! All strategies are long-only and flip their position flag only when the
//! job runner reports a fill.

mod ema_breakout;
mod ema_crossover;
mod low_rsi;
mod registry;

pub use ema_breakout::{EmaBreakoutConfig, EmaBreakoutStrategy};
pub use ema_crossover::{EmaCrossoverConfig, EmaCrossoverStrategy};
pub use low_rsi::{LowRsiConfig, LowRsiStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};

#[cfg(test)]
pub(crate) mod test_support {
    use chainbot_core::traits::Strategy;
    use chainbot_core::types::{
        Bar, BarSeries, Fill, Order, OrderRequest, Side, Signal, Timeframe,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub fn bar(i: usize, close: f64, volume: f64) -> Bar {
        Bar::new(
            i as i64 * 3_600_000,
            close,
            close * 1.002,
            close * 0.998,
            close,
            volume,
        )
    }

    /// Feed closes one candle at a time, filling every emitted signal.
    pub fn run(strategy: &mut dyn Strategy, closes: &[f64]) -> Vec<(usize, Signal)> {
        let mut series = BarSeries::with_capacity("ETH", Timeframe::Hour1, 500);
        let mut signals = Vec::new();
        for (i, &close) in closes.iter().enumerate() {
            series.push(bar(i, close, 1_000.0));
            if let Some(signal) = strategy.on_bar(&series) {
                let side = if signal.signal_type.is_entry() {
                    Side::Buy
                } else {
                    Side::Sell
                };
                strategy.on_fill(&filled(side, close));
                signals.push((i, signal));
            }
        }
        signals
    }

    pub fn filled(side: Side, price: f64) -> Order {
        let mut order = Order::from_request(&OrderRequest::market("ETH", side, dec!(1)));
        order.add_fill(&Fill {
            order_id: order.id,
            quantity: dec!(1),
            price: Decimal::try_from(price).unwrap_or_default(),
            fee: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            timestamp: chrono::Utc::now(),
        });
        order
    }
}
