use crate::db::{now_millis, Store};
use crate::error::StoreResult;
use crate::models::{NewPaperTrade, PaperTradeRecord, PortfolioEntry};
use rust_decimal::Decimal;

impl Store {
    /// Insert or overwrite the holding of one asset in one wallet.
    pub async fn upsert_portfolio(
        &self,
        user_id: i64,
        wallet_id: i64,
        symbol: &str,
        token_address: Option<&str>,
        amount: Decimal,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO portfolios (user_id, wallet_id, symbol, token_address, amount, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(wallet_id, symbol, token_address) DO UPDATE SET
                 amount = excluded.amount,
                 updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(wallet_id)
        .bind(symbol)
        .bind(token_address.unwrap_or(""))
        .bind(amount.to_string())
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_portfolio(&self, user_id: i64) -> StoreResult<Vec<PortfolioEntry>> {
        Ok(sqlx::query_as::<_, PortfolioEntry>(
            "SELECT user_id, wallet_id, symbol, token_address, amount, updated_at
             FROM portfolios WHERE user_id = ?
             ORDER BY wallet_id, symbol",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn add_paper_trade(&self, trade: &NewPaperTrade) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO paper_trades
                 (strategy_id, user_id, symbol, side, quantity, price, pnl, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(trade.strategy_id)
        .bind(trade.user_id)
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.quantity.to_string())
        .bind(trade.price.to_string())
        .bind(trade.pnl.map(|p| p.to_string()))
        .bind(trade.reason.as_deref())
        .bind(trade.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Newest first.
    pub async fn list_paper_trades(
        &self,
        user_id: i64,
        limit: u32,
    ) -> StoreResult<Vec<PaperTradeRecord>> {
        Ok(sqlx::query_as::<_, PaperTradeRecord>(
            "SELECT id, strategy_id, user_id, symbol, side, quantity, price, pnl, reason, created_at
             FROM paper_trades WHERE user_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?)
    }
}
