use crate::db::{now_millis, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{SettingsUpdate, User, UserSettings};
use rust_decimal::Decimal;
use tracing::debug;

impl Store {
    /// Insert the user or refresh their names. `created_at` is kept.
    pub async fn upsert_user(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> StoreResult<User> {
        sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, last_name, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO UPDATE SET
                 username = excluded.username,
                 first_name = excluded.first_name,
                 last_name = excluded.last_name",
        )
        .bind(telegram_id)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        debug!(telegram_id, "user upserted");
        self.get_user(telegram_id)
            .await?
            .ok_or_else(|| StoreError::InvalidValue(format!("user {telegram_id} vanished")))
    }

    pub async fn get_user(&self, telegram_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT telegram_id, username, first_name, last_name, created_at
             FROM users WHERE telegram_id = ?",
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Stored settings, or the defaults when the user never changed any.
    pub async fn get_settings(&self, user_id: i64) -> StoreResult<UserSettings> {
        let settings = sqlx::query_as::<_, UserSettings>(
            "SELECT user_id, default_chain, max_slippage, notifications
             FROM user_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings.unwrap_or_else(|| UserSettings::defaults(user_id)))
    }

    /// Apply a partial update. Fields left `None` keep their stored value
    /// (or the default for a new row).
    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> StoreResult<UserSettings> {
        if let Some(slippage) = update.max_slippage {
            if slippage < Decimal::ZERO {
                return Err(StoreError::InvalidValue(format!(
                    "max_slippage must not be negative: {slippage}"
                )));
            }
        }

        sqlx::query(
            "INSERT INTO user_settings (user_id, default_chain, max_slippage, notifications)
             VALUES (?1, COALESCE(?2, 'ethereum'), COALESCE(?3, '5.0'), COALESCE(?4, 1))
             ON CONFLICT(user_id) DO UPDATE SET
                 default_chain = COALESCE(?2, default_chain),
                 max_slippage = COALESCE(?3, max_slippage),
                 notifications = COALESCE(?4, notifications)",
        )
        .bind(user_id)
        .bind(update.default_chain.map(|c| c.as_str()))
        .bind(update.max_slippage.map(|d| d.to_string()))
        .bind(update.notifications)
        .execute(&self.pool)
        .await?;

        debug!(user_id, "settings updated");
        self.get_settings(user_id).await
    }
}
