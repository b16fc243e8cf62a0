//! Risk controls for paper strategy jobs.
//!
//! Position sizing for fractional crypto quantities, stop-loss placement
//! and account level limits.

mod portfolio_limits;
mod position_sizer;
mod risk_manager;
mod stop_loss;

pub use portfolio_limits::{LimitCheck, PortfolioLimits};
pub use position_sizer::{round_quantity, strength_multiplier, PositionSizer, PositionSizingMethod, QUANTITY_DP};
pub use risk_manager::{RiskConfig, RiskDecision, RiskManager};
pub use stop_loss::{ActiveStop, StopLossManager, StopLossMethod};
