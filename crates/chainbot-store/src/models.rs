//! Row types.

use chainbot_core::types::{Chain, Side, Timeframe, TxStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;

fn column_error(column: &str, message: impl fmt::Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.to_string().into(),
    }
}

/// Read a text column and parse it.
fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| column_error(column, e))
}

fn parsed_opt<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| s.parse().map_err(|e| column_error(column, e)))
        .transpose()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: i64,
    pub default_chain: Chain,
    /// Percent.
    pub max_slippage: Decimal,
    pub notifications: bool,
}

impl UserSettings {
    pub fn defaults(user_id: i64) -> Self {
        Self {
            user_id,
            default_chain: Chain::Ethereum,
            max_slippage: Decimal::new(50, 1),
            notifications: true,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for UserSettings {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            default_chain: parsed(row, "default_chain")?,
            max_slippage: parsed(row, "max_slippage")?,
            notifications: row.try_get("notifications")?,
        })
    }
}

/// Partial settings change. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub default_chain: Option<Chain>,
    pub max_slippage: Option<Decimal>,
    pub notifications: Option<bool>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.default_chain.is_none() && self.max_slippage.is_none() && self.notifications.is_none()
    }
}

#[derive(Clone)]
pub struct WalletRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub address: String,
    pub encrypted_private_key: String,
    pub chain: Chain,
    /// Last fetched native balance.
    pub balance: Option<Decimal>,
    pub balance_raw: Option<String>,
    pub balance_updated_at: Option<i64>,
    pub created_at: i64,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("encrypted_private_key", &"<redacted>")
            .field("chain", &self.chain)
            .field("balance", &self.balance)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl<'r> FromRow<'r, SqliteRow> for WalletRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            address: row.try_get("address")?,
            encrypted_private_key: row.try_get("encrypted_private_key")?,
            chain: parsed(row, "chain")?,
            balance: parsed_opt(row, "balance")?,
            balance_raw: row.try_get("balance_raw")?,
            balance_updated_at: row.try_get("balance_updated_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Clone)]
pub struct NewWallet {
    pub user_id: i64,
    pub name: String,
    pub address: String,
    pub encrypted_private_key: String,
    pub chain: Chain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub wallet_id: Option<i64>,
    pub chain: Chain,
    pub tx_hash: String,
    /// `native` or `token`.
    pub kind: String,
    pub from_address: String,
    pub to_address: String,
    pub token_address: Option<String>,
    pub amount: Decimal,
    pub status: TxStatus,
    pub created_at: i64,
}

impl<'r> FromRow<'r, SqliteRow> for TransactionRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            wallet_id: row.try_get("wallet_id")?,
            chain: parsed(row, "chain")?,
            tx_hash: row.try_get("tx_hash")?,
            kind: row.try_get("kind")?,
            from_address: row.try_get("from_address")?,
            to_address: row.try_get("to_address")?,
            token_address: row.try_get("token_address")?,
            amount: parsed(row, "amount")?,
            status: parsed(row, "status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub wallet_id: Option<i64>,
    pub chain: Chain,
    pub tx_hash: String,
    pub kind: String,
    pub from_address: String,
    pub to_address: String,
    pub token_address: Option<String>,
    pub amount: Decimal,
    pub status: TxStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub strategy_type: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub parameters: serde_json::Value,
    pub stop_loss_pct: Option<Decimal>,
    pub active: bool,
    pub created_at: i64,
}

impl<'r> FromRow<'r, SqliteRow> for StrategyRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let parameters: String = row.try_get("parameters")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            strategy_type: row.try_get("strategy_type")?,
            symbol: row.try_get("symbol")?,
            timeframe: parsed(row, "timeframe")?,
            parameters: serde_json::from_str(&parameters)
                .map_err(|e| column_error("parameters", e))?,
            stop_loss_pct: parsed_opt(row, "stop_loss_pct")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub user_id: i64,
    pub name: String,
    pub strategy_type: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub parameters: serde_json::Value,
    pub stop_loss_pct: Option<Decimal>,
}

/// Holding of one asset in one wallet. `token_address` is `None` for the
/// native coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub user_id: i64,
    pub wallet_id: i64,
    pub symbol: String,
    pub token_address: Option<String>,
    pub amount: Decimal,
    pub updated_at: i64,
}

impl<'r> FromRow<'r, SqliteRow> for PortfolioEntry {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let token_address: String = row.try_get("token_address")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            wallet_id: row.try_get("wallet_id")?,
            symbol: row.try_get("symbol")?,
            token_address: (!token_address.is_empty()).then_some(token_address),
            amount: parsed(row, "amount")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperTradeRecord {
    pub id: i64,
    pub strategy_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub pnl: Option<Decimal>,
    pub reason: Option<String>,
    pub created_at: i64,
}

impl<'r> FromRow<'r, SqliteRow> for PaperTradeRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            strategy_id: row.try_get("strategy_id")?,
            user_id: row.try_get("user_id")?,
            symbol: row.try_get("symbol")?,
            side: parsed(row, "side")?,
            quantity: parsed(row, "quantity")?,
            price: parsed(row, "price")?,
            pnl: parsed_opt(row, "pnl")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPaperTrade {
    pub strategy_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub pnl: Option<Decimal>,
    pub reason: Option<String>,
    /// Event time in unix millis.
    pub created_at: i64,
}
