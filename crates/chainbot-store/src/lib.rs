//! SQLite persistence.
//!
//! One [`Store`] wraps a sqlx pool; each table gets its own `impl Store`
//! block. Decimal amounts are stored as text so no precision is lost, and
//! timestamps as unix milliseconds.

mod db;
mod error;
mod models;
mod portfolio;
mod strategies;
mod transactions;
mod users;
mod wallets;

pub use db::Store;
pub use error::{StoreError, StoreResult};
pub use models::{
    NewPaperTrade, NewStrategy, NewTransaction, NewWallet, PaperTradeRecord, PortfolioEntry,
    SettingsUpdate, StrategyRecord, TransactionRecord, User, UserSettings, WalletRecord,
};
pub use transactions::DEFAULT_HISTORY_LIMIT;
