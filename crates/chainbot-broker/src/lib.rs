//! Order execution for strategy jobs.
//!
//! Strategies never touch real funds; every job trades against its own
//! [`PaperBroker`] account.

mod paper;

pub use paper::{PaperBroker, PaperConfig};
