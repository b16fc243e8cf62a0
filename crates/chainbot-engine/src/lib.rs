//! Strategy execution.
//!
//! [`StrategyJob`] is the per-candle state machine shared by live paper
//! trading ([`StrategyScheduler`]) and historical replay ([`Backtester`]).

mod backtest;
mod job;
mod report;
mod scheduler;
mod statistics;

pub use backtest::{BacktestConfig, Backtester};
pub use job::{CloseReason, EngineEvent, EventKind, JobSpec, StrategyJob};
pub use report::BacktestReport;
pub use scheduler::{SchedulerConfig, StrategyScheduler};
pub use statistics::{BacktestStats, TradeRecord};
