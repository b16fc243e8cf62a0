//! Account level limits on new entries.

use chainbot_core::types::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    Allowed,
    Blocked { reason: String },
    /// Allowed up to `max_value` in quote currency.
    Reduced { max_value: Decimal, reason: String },
}

impl LimitCheck {
    pub fn is_allowed(&self) -> bool {
        !self.is_blocked()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitCheck::Blocked { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioLimits {
    /// Largest single entry, percent of equity.
    pub max_position_pct: Decimal,
    /// Total market value of holdings, percent of equity.
    pub max_exposure_pct: Decimal,
    pub max_positions: usize,
    /// Stop opening positions after losing this much today, percent of start-of-day equity.
    pub daily_loss_limit_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    /// Cash that must remain after an entry.
    pub min_cash: Decimal,
    /// Largest holding in one asset after the entry, percent of equity.
    pub max_concentration_pct: Decimal,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(25),
            max_exposure_pct: dec!(95),
            max_positions: 5,
            daily_loss_limit_pct: dec!(5),
            max_drawdown_pct: dec!(30),
            min_cash: dec!(0),
            max_concentration_pct: dec!(50),
        }
    }
}

impl PortfolioLimits {
    fn daily_loss_pct(portfolio: &Portfolio) -> Decimal {
        if portfolio.day_start_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        portfolio.daily_pnl() / portfolio.day_start_equity * dec!(100)
    }

    /// Reason to stop opening positions, if any.
    pub fn should_halt_trading(&self, portfolio: &Portfolio) -> Option<String> {
        let daily = Self::daily_loss_pct(portfolio);
        if daily <= -self.daily_loss_limit_pct {
            return Some(format!(
                "Daily loss limit reached: {:.2}% (limit {:.2}%)",
                daily.abs(),
                self.daily_loss_limit_pct
            ));
        }
        let drawdown = portfolio.drawdown();
        if drawdown >= self.max_drawdown_pct {
            return Some(format!(
                "Max drawdown exceeded: {:.2}% (limit {:.2}%)",
                drawdown, self.max_drawdown_pct
            ));
        }
        None
    }

    /// Check an entry of `position_value` in `symbol`.
    ///
    /// When several caps apply the tightest one wins.
    pub fn check_new_position(
        &self,
        portfolio: &Portfolio,
        symbol: &str,
        position_value: Decimal,
    ) -> LimitCheck {
        if let Some(reason) = self.should_halt_trading(portfolio) {
            return LimitCheck::Blocked { reason };
        }

        let adding = portfolio.has_position(symbol);
        if !adding && portfolio.position_count() >= self.max_positions {
            return LimitCheck::Blocked {
                reason: format!(
                    "Max positions reached: {} (limit {})",
                    portfolio.position_count(),
                    self.max_positions
                ),
            };
        }

        let equity = portfolio.equity;
        if equity <= Decimal::ZERO {
            return LimitCheck::Blocked {
                reason: "Account has no equity".to_string(),
            };
        }

        let held = portfolio
            .get_position(symbol)
            .map(|p| p.market_value())
            .unwrap_or_default();
        let caps = [
            (
                portfolio.cash - self.min_cash,
                format!("minimum cash {:.2}", self.min_cash),
            ),
            (
                equity * self.max_exposure_pct / dec!(100) - portfolio.total_market_value(),
                format!("max exposure {:.2}%", self.max_exposure_pct),
            ),
            (
                equity * self.max_position_pct / dec!(100),
                format!("max position size {:.2}%", self.max_position_pct),
            ),
            (
                equity * self.max_concentration_pct / dec!(100) - held,
                format!("max concentration {:.2}%", self.max_concentration_pct),
            ),
        ];

        let Some((cap, label)) = caps
            .into_iter()
            .min_by(|a, b| a.0.cmp(&b.0))
        else {
            return LimitCheck::Allowed;
        };

        if cap <= Decimal::ZERO {
            LimitCheck::Blocked {
                reason: format!("No room left under {label}"),
            }
        } else if position_value > cap {
            LimitCheck::Reduced {
                max_value: cap,
                reason: format!("Limited by {label}"),
            }
        } else {
            LimitCheck::Allowed
        }
    }
}
