use crate::db::{now_millis, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewWallet, WalletRecord};
use chainbot_core::types::Chain;
use rust_decimal::Decimal;
use tracing::{debug, info};

const WALLET_COLUMNS: &str = "id, user_id, name, address, encrypted_private_key, chain, \
     balance, balance_raw, balance_updated_at, created_at";

impl Store {
    /// Insert a wallet. A second wallet with the same name on the same chain
    /// is a [`StoreError::Duplicate`].
    pub async fn add_wallet(&self, wallet: &NewWallet) -> StoreResult<WalletRecord> {
        let result = sqlx::query(
            "INSERT INTO wallets (user_id, name, address, encrypted_private_key, chain, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(wallet.user_id)
        .bind(&wallet.name)
        .bind(&wallet.address)
        .bind(&wallet.encrypted_private_key)
        .bind(wallet.chain.as_str())
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StoreError::from_insert(e, format!("wallet '{}' on {}", wallet.name, wallet.chain))
        })?;

        let id = result.last_insert_rowid();
        info!(user_id = wallet.user_id, wallet_id = id, chain = %wallet.chain, "wallet stored");
        self.wallet_by_id(id)
            .await?
            .ok_or_else(|| StoreError::InvalidValue(format!("wallet {id} vanished")))
    }

    async fn wallet_by_id(&self, id: i64) -> StoreResult<Option<WalletRecord>> {
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = ?");
        Ok(sqlx::query_as::<_, WalletRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// All wallets of a user, newest first.
    pub async fn list_wallets(&self, user_id: i64) -> StoreResult<Vec<WalletRecord>> {
        let sql = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, WalletRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn find_wallet(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
    ) -> StoreResult<Option<WalletRecord>> {
        let sql = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ? AND name = ? AND chain = ?"
        );
        Ok(sqlx::query_as::<_, WalletRecord>(&sql)
            .bind(user_id)
            .bind(name)
            .bind(chain.as_str())
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Returns whether a row was deleted.
    pub async fn remove_wallet(&self, user_id: i64, name: &str, chain: Chain) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM wallets WHERE user_id = ? AND name = ? AND chain = ?")
            .bind(user_id)
            .bind(name)
            .bind(chain.as_str())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        debug!(user_id, name, chain = %chain, removed, "wallet remove");
        Ok(removed)
    }

    /// Cache the last fetched native balance on the wallet row.
    pub async fn update_wallet_balance(
        &self,
        wallet_id: i64,
        balance: Decimal,
        balance_raw: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE wallets SET balance = ?, balance_raw = ?, balance_updated_at = ? WHERE id = ?",
        )
        .bind(balance.to_string())
        .bind(balance_raw)
        .bind(now_millis())
        .bind(wallet_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_wallet(user_id: i64, name: &str, chain: Chain) -> NewWallet {
        NewWallet {
            user_id,
            name: name.to_string(),
            address: "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
            encrypted_private_key: "gAAAAA-ciphertext".to_string(),
            chain,
        }
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let store = Store::in_memory().await.unwrap();
        let wallet = store.add_wallet(&new_wallet(1, "main", Chain::Ethereum)).await.unwrap();
        assert_eq!(wallet.name, "main");
        assert!(wallet.balance.is_none());

        let found = store.find_wallet(1, "main", Chain::Ethereum).await.unwrap().unwrap();
        assert_eq!(found.id, wallet.id);
        assert!(store.find_wallet(1, "main", Chain::Base).await.unwrap().is_none());
        assert!(!format!("{found:?}").contains("ciphertext"));
    }

    #[tokio::test]
    async fn test_duplicate_name_per_chain() {
        let store = Store::in_memory().await.unwrap();
        store.add_wallet(&new_wallet(1, "main", Chain::Ethereum)).await.unwrap();
        assert!(matches!(
            store.add_wallet(&new_wallet(1, "main", Chain::Ethereum)).await,
            Err(StoreError::Duplicate(_))
        ));
        // Same name on another chain or for another user is fine.
        store.add_wallet(&new_wallet(1, "main", Chain::Bsc)).await.unwrap();
        store.add_wallet(&new_wallet(2, "main", Chain::Ethereum)).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_newest_first_and_remove() {
        let store = Store::in_memory().await.unwrap();
        store.add_wallet(&new_wallet(1, "a", Chain::Ethereum)).await.unwrap();
        store.add_wallet(&new_wallet(1, "b", Chain::Ethereum)).await.unwrap();
        store.add_wallet(&new_wallet(2, "c", Chain::Ethereum)).await.unwrap();

        let names: Vec<String> = store
            .list_wallets(1)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);

        assert!(store.remove_wallet(1, "a", Chain::Ethereum).await.unwrap());
        assert!(!store.remove_wallet(1, "a", Chain::Ethereum).await.unwrap());
        assert_eq!(store.list_wallets(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_cache() {
        let store = Store::in_memory().await.unwrap();
        let wallet = store.add_wallet(&new_wallet(1, "main", Chain::Polygon)).await.unwrap();
        store
            .update_wallet_balance(wallet.id, dec!(1.25), "1250000000000000000")
            .await
            .unwrap();

        let found = store.find_wallet(1, "main", Chain::Polygon).await.unwrap().unwrap();
        assert_eq!(found.balance, Some(dec!(1.25)));
        assert_eq!(found.balance_raw.as_deref(), Some("1250000000000000000"));
        assert!(found.balance_updated_at.is_some());
    }
}
