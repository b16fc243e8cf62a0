//! Turns strategy signals into sized paper orders.

use chainbot_core::types::{OrderRequest, Portfolio, Side, Signal, SignalType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position_sizer::round_quantity;
use crate::{
    LimitCheck, PortfolioLimits, PositionSizer, PositionSizingMethod, StopLossManager,
    StopLossMethod,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub position_sizing: PositionSizingMethod,
    pub stop_loss: StopLossMethod,
    pub limits: PortfolioLimits,
    /// Base asset cap per order.
    pub max_quantity: Option<Decimal>,
    pub use_signal_strength: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            position_sizing: PositionSizingMethod::default(),
            stop_loss: StopLossMethod::default(),
            limits: PortfolioLimits::default(),
            max_quantity: None,
            use_signal_strength: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RiskDecision {
    Approved {
        order: OrderRequest,
        stop_loss_price: Option<Decimal>,
    },
    Rejected {
        reason: String,
    },
    /// Approved with a smaller size than the sizer asked for.
    Modified {
        order: OrderRequest,
        stop_loss_price: Option<Decimal>,
        reason: String,
    },
}

impl RiskDecision {
    pub fn is_approved(&self) -> bool {
        !matches!(self, RiskDecision::Rejected { .. })
    }

    pub fn order(&self) -> Option<&OrderRequest> {
        match self {
            RiskDecision::Approved { order, .. } | RiskDecision::Modified { order, .. } => {
                Some(order)
            }
            RiskDecision::Rejected { .. } => None,
        }
    }

    pub fn stop_loss_price(&self) -> Option<Decimal> {
        match self {
            RiskDecision::Approved {
                stop_loss_price, ..
            }
            | RiskDecision::Modified {
                stop_loss_price, ..
            } => *stop_loss_price,
            RiskDecision::Rejected { .. } => None,
        }
    }
}

/// Sizing, stop placement and account limits in one place.
pub struct RiskManager {
    config: RiskConfig,
    position_sizer: PositionSizer,
    stop_loss: StopLossManager,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        let mut position_sizer = PositionSizer::new(config.position_sizing.clone());
        if let Some(max) = config.max_quantity {
            position_sizer = position_sizer.with_max_quantity(max);
        }
        if !config.use_signal_strength {
            position_sizer = position_sizer.without_signal_strength();
        }
        let stop_loss = StopLossManager::new(config.stop_loss.clone());
        Self {
            config,
            position_sizer,
            stop_loss,
        }
    }

    /// Replace the configured stop method with a fixed percent stop.
    pub fn with_stop_loss_pct(mut self, percent: Decimal) -> Self {
        self.stop_loss = StopLossManager::percent(percent);
        self
    }

    pub fn stop_loss(&self) -> &StopLossManager {
        &self.stop_loss
    }

    pub fn update_atr(&mut self, atr: Decimal) {
        self.stop_loss.update_atr(atr);
    }

    pub fn evaluate_signal(
        &self,
        portfolio: &Portfolio,
        signal: &Signal,
        price: Decimal,
    ) -> RiskDecision {
        match signal.signal_type {
            SignalType::Hold => RiskDecision::Rejected {
                reason: "Hold signal, nothing to do".to_string(),
            },
            SignalType::Sell | SignalType::CloseLong => self.evaluate_exit(portfolio, signal),
            SignalType::Buy => self.evaluate_entry(portfolio, signal, price),
        }
    }

    /// Exits sell the whole holding and skip entry limits.
    fn evaluate_exit(&self, portfolio: &Portfolio, signal: &Signal) -> RiskDecision {
        match portfolio.get_position(&signal.symbol) {
            Some(position) if !position.is_flat() => RiskDecision::Approved {
                order: OrderRequest::market(&signal.symbol, Side::Sell, position.quantity),
                stop_loss_price: None,
            },
            _ => RiskDecision::Rejected {
                reason: format!("No {} position to sell", signal.symbol),
            },
        }
    }

    fn evaluate_entry(&self, portfolio: &Portfolio, signal: &Signal, price: Decimal) -> RiskDecision {
        if price <= Decimal::ZERO {
            return RiskDecision::Rejected {
                reason: "No valid price".to_string(),
            };
        }
        let stop_loss_price = self.stop_loss.calculate_stop_price(price);
        let quantity = self
            .position_sizer
            .calculate(portfolio, signal, price, stop_loss_price);
        if quantity <= Decimal::ZERO {
            return RiskDecision::Rejected {
                reason: "Position size rounds to zero".to_string(),
            };
        }

        match self
            .config
            .limits
            .check_new_position(portfolio, &signal.symbol, quantity * price)
        {
            LimitCheck::Blocked { reason } => RiskDecision::Rejected { reason },
            LimitCheck::Reduced { max_value, reason } => {
                let reduced = round_quantity(max_value / price);
                if reduced <= Decimal::ZERO {
                    return RiskDecision::Rejected {
                        reason: format!("Position too small after reduction: {reason}"),
                    };
                }
                RiskDecision::Modified {
                    order: OrderRequest::market(&signal.symbol, Side::Buy, reduced),
                    stop_loss_price,
                    reason,
                }
            }
            LimitCheck::Allowed => RiskDecision::Approved {
                order: OrderRequest::market(&signal.symbol, Side::Buy, quantity),
                stop_loss_price,
            },
        }
    }

    pub fn should_halt(&self, portfolio: &Portfolio) -> Option<String> {
        self.config.limits.should_halt_trading(portfolio)
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
