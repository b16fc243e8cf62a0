use crate::db::{now_millis, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewStrategy, StrategyRecord};
use rust_decimal::Decimal;
use tracing::info;

const STRATEGY_COLUMNS: &str = "id, user_id, name, strategy_type, symbol, timeframe, \
     parameters, stop_loss_pct, active, created_at";

impl Store {
    /// Store a strategy configuration. New strategies start inactive.
    pub async fn add_strategy(&self, strategy: &NewStrategy) -> StoreResult<StrategyRecord> {
        let parameters = serde_json::to_string(&strategy.parameters)
            .map_err(|e| StoreError::InvalidValue(format!("strategy parameters: {e}")))?;
        let result = sqlx::query(
            "INSERT INTO strategies
                 (user_id, name, strategy_type, symbol, timeframe, parameters, stop_loss_pct, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(strategy.user_id)
        .bind(&strategy.name)
        .bind(&strategy.strategy_type)
        .bind(&strategy.symbol)
        .bind(strategy.timeframe.to_string())
        .bind(parameters)
        .bind(strategy.stop_loss_pct.map(|d| d.to_string()))
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(user_id = strategy.user_id, strategy_id = id, kind = %strategy.strategy_type, "strategy stored");
        self.get_strategy(strategy.user_id, id)
            .await?
            .ok_or_else(|| StoreError::InvalidValue(format!("strategy {id} vanished")))
    }

    /// A user's strategies, oldest first so ids read in order.
    pub async fn list_strategies(&self, user_id: i64) -> StoreResult<Vec<StrategyRecord>> {
        let sql = format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE user_id = ? ORDER BY id");
        Ok(sqlx::query_as::<_, StrategyRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Look up a strategy owned by `user_id`.
    pub async fn get_strategy(&self, user_id: i64, id: i64) -> StoreResult<Option<StrategyRecord>> {
        let sql = format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ? AND user_id = ?");
        Ok(sqlx::query_as::<_, StrategyRecord>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn set_strategy_active(&self, user_id: i64, id: i64, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE strategies SET active = ? WHERE id = ? AND user_id = ?")
            .bind(active)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `None` clears the override and falls back to the configured stop.
    pub async fn set_strategy_stop_loss(
        &self,
        user_id: i64,
        id: i64,
        stop_loss_pct: Option<Decimal>,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE strategies SET stop_loss_pct = ? WHERE id = ? AND user_id = ?")
                .bind(stop_loss_pct.map(|d| d.to_string()))
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_strategy(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM strategies WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every active strategy across all users, for restart recovery.
    pub async fn active_strategies(&self) -> StoreResult<Vec<StrategyRecord>> {
        let sql = format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE active = 1 ORDER BY id");
        Ok(sqlx::query_as::<_, StrategyRecord>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}
