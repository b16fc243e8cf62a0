//! Position sizing.

use chainbot_core::types::{Portfolio, Signal, SignalStrength};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Decimal places kept on base asset quantities.
pub const QUANTITY_DP: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PositionSizingMethod {
    /// Fixed base asset quantity per trade.
    Fixed { quantity: Decimal },
    /// Fixed quote currency amount per trade.
    FixedAmount { amount: Decimal },
    /// Percent of current equity.
    PercentEquity { percent: Decimal },
    /// Percent of equity lost if the stop is hit.
    RiskBased { risk_percent: Decimal },
    /// Kelly fraction, capped at 25% of equity.
    Kelly {
        win_rate: Decimal,
        avg_win_loss_ratio: Decimal,
    },
}

impl Default for PositionSizingMethod {
    fn default() -> Self {
        PositionSizingMethod::PercentEquity { percent: dec!(10) }
    }
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    method: PositionSizingMethod,
    max_quantity: Option<Decimal>,
    max_position_value: Option<Decimal>,
    use_signal_strength: bool,
}

impl PositionSizer {
    pub fn new(method: PositionSizingMethod) -> Self {
        Self {
            method,
            max_quantity: None,
            max_position_value: None,
            use_signal_strength: true,
        }
    }

    pub fn with_max_quantity(mut self, max: Decimal) -> Self {
        self.max_quantity = Some(max);
        self
    }

    pub fn with_max_position_value(mut self, max: Decimal) -> Self {
        self.max_position_value = Some(max);
        self
    }

    pub fn without_signal_strength(mut self) -> Self {
        self.use_signal_strength = false;
        self
    }

    pub fn method(&self) -> &PositionSizingMethod {
        &self.method
    }

    /// Base asset quantity to buy, never more than cash can pay for.
    pub fn calculate(
        &self,
        portfolio: &Portfolio,
        signal: &Signal,
        price: Decimal,
        stop_price: Option<Decimal>,
    ) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let pct = |p: Decimal| portfolio.equity * p / dec!(100);
        let base = match &self.method {
            PositionSizingMethod::Fixed { quantity } => *quantity,
            PositionSizingMethod::FixedAmount { amount } => *amount / price,
            PositionSizingMethod::PercentEquity { percent } => pct(*percent) / price,
            PositionSizingMethod::RiskBased { risk_percent } => match stop_price {
                Some(stop) if stop != price => pct(*risk_percent) / (price - stop).abs(),
                Some(_) => Decimal::ZERO,
                // Without a stop the risk budget becomes the position value.
                None => pct(*risk_percent) / price,
            },
            PositionSizingMethod::Kelly {
                win_rate,
                avg_win_loss_ratio,
            } => {
                if avg_win_loss_ratio.is_zero() {
                    Decimal::ZERO
                } else {
                    let f = *win_rate - (Decimal::ONE - *win_rate) / *avg_win_loss_ratio;
                    portfolio.equity * f.clamp(Decimal::ZERO, dec!(0.25)) / price
                }
            }
        };

        let mut size = if self.use_signal_strength {
            base * strength_multiplier(signal.strength)
        } else {
            base
        };

        if let Some(max) = self.max_quantity {
            size = size.min(max);
        }
        if let Some(max_value) = self.max_position_value {
            size = size.min(max_value / price);
        }
        size = size.min(portfolio.cash.max(Decimal::ZERO) / price);

        round_quantity(size)
    }
}

pub fn strength_multiplier(strength: SignalStrength) -> Decimal {
    match strength {
        SignalStrength::Weak => dec!(0.5),
        SignalStrength::Moderate => dec!(1.0),
        SignalStrength::Strong => dec!(1.5),
    }
}

/// Truncate to the quantity precision used for paper fills.
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity
        .max(Decimal::ZERO)
        .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::ToZero)
        .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbot_core::types::SignalType;

    fn signal(strength: SignalStrength) -> Signal {
        Signal::new("ETH", SignalType::Buy, strength, 2000.0, 0)
    }

    #[test]
    fn test_fixed_quantity() {
        let sizer = PositionSizer::new(PositionSizingMethod::Fixed { quantity: dec!(0.25) })
            .without_signal_strength();
        let size = sizer.calculate(
            &Portfolio::new(dec!(10000)),
            &signal(SignalStrength::Moderate),
            dec!(2000),
            None,
        );
        assert_eq!(size, dec!(0.25));
    }

    #[test]
    fn test_percent_equity_is_fractional() {
        let sizer = PositionSizer::new(PositionSizingMethod::PercentEquity { percent: dec!(10) })
            .without_signal_strength();
        let size = sizer.calculate(
            &Portfolio::new(dec!(10000)),
            &signal(SignalStrength::Moderate),
            dec!(3000),
            None,
        );
        // 1000 / 3000 truncated to 6 dp
        assert_eq!(size, dec!(0.333333));
    }

    #[test]
    fn test_risk_based_uses_stop_distance() {
        let sizer = PositionSizer::new(PositionSizingMethod::RiskBased { risk_percent: dec!(1) })
            .without_signal_strength();
        let size = sizer.calculate(
            &Portfolio::new(dec!(10000)),
            &signal(SignalStrength::Moderate),
            dec!(100),
            Some(dec!(95)),
        );
        // risk 100 over 5 per unit, capped by cash at 100 units
        assert_eq!(size, dec!(20));
    }

    #[test]
    fn test_strength_multiplier() {
        let sizer = PositionSizer::new(PositionSizingMethod::Fixed { quantity: dec!(2) });
        let portfolio = Portfolio::new(dec!(100000));
        let weak = sizer.calculate(&portfolio, &signal(SignalStrength::Weak), dec!(10), None);
        let strong = sizer.calculate(&portfolio, &signal(SignalStrength::Strong), dec!(10), None);
        assert_eq!(weak, dec!(1));
        assert_eq!(strong, dec!(3));
    }

    #[test]
    fn test_kelly_is_capped() {
        let sizer = PositionSizer::new(PositionSizingMethod::Kelly {
            win_rate: dec!(0.9),
            avg_win_loss_ratio: dec!(3),
        })
        .without_signal_strength();
        let size = sizer.calculate(
            &Portfolio::new(dec!(1000)),
            &signal(SignalStrength::Moderate),
            dec!(10),
            None,
        );
        assert_eq!(size, dec!(25));
    }

    #[test]
    fn test_cash_and_value_limits() {
        let sizer = PositionSizer::new(PositionSizingMethod::Fixed { quantity: dec!(10) })
            .with_max_position_value(dec!(500))
            .without_signal_strength();
        let mut portfolio = Portfolio::new(dec!(10000));
        let size = sizer.calculate(&portfolio, &signal(SignalStrength::Moderate), dec!(100), None);
        assert_eq!(size, dec!(5));

        portfolio.cash = dec!(150);
        let size = sizer.calculate(&portfolio, &signal(SignalStrength::Moderate), dec!(100), None);
        assert_eq!(size, dec!(1.5));
    }

    #[test]
    fn test_round_quantity() {
        assert_eq!(round_quantity(dec!(0.1234569)), dec!(0.123456));
        assert_eq!(round_quantity(dec!(-1)), Decimal::ZERO);
    }
}
