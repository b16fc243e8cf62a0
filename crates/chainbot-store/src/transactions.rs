use crate::db::{now_millis, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{NewTransaction, TransactionRecord};
use chainbot_core::types::TxStatus;

/// Rows returned by [`Store::list_transactions`] when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

impl Store {
    pub async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<TransactionRecord> {
        let created_at = now_millis();
        let result = sqlx::query(
            "INSERT INTO transactions
                 (user_id, wallet_id, chain, tx_hash, kind, from_address, to_address,
                  token_address, amount, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tx.user_id)
        .bind(tx.wallet_id)
        .bind(tx.chain.as_str())
        .bind(&tx.tx_hash)
        .bind(&tx.kind)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(tx.token_address.as_deref())
        .bind(tx.amount.to_string())
        .bind(tx.status.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, format!("transaction {}", tx.tx_hash)))?;

        Ok(TransactionRecord {
            id: result.last_insert_rowid(),
            user_id: tx.user_id,
            wallet_id: tx.wallet_id,
            chain: tx.chain,
            tx_hash: tx.tx_hash.clone(),
            kind: tx.kind.clone(),
            from_address: tx.from_address.clone(),
            to_address: tx.to_address.clone(),
            token_address: tx.token_address.clone(),
            amount: tx.amount,
            status: tx.status,
            created_at,
        })
    }

    /// Returns whether any row matched `tx_hash`.
    pub async fn update_transaction_status(
        &self,
        tx_hash: &str,
        status: TxStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE transactions SET status = ? WHERE tx_hash = ?")
            .bind(status.as_str())
            .bind(tx_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest first, at most `limit` rows ([`DEFAULT_HISTORY_LIMIT`] when `None`).
    pub async fn list_transactions(
        &self,
        user_id: i64,
        limit: Option<u32>,
    ) -> StoreResult<Vec<TransactionRecord>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(sqlx::query_as::<_, TransactionRecord>(
            "SELECT id, user_id, wallet_id, chain, tx_hash, kind, from_address, to_address,
                    token_address, amount, status, created_at
             FROM transactions WHERE user_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbot_core::types::Chain;
    use rust_decimal_macros::dec;

    fn tx(user_id: i64, hash: &str) -> NewTransaction {
        NewTransaction {
            user_id,
            wallet_id: None,
            chain: Chain::Base,
            tx_hash: hash.to_string(),
            kind: "native".to_string(),
            from_address: "0xfrom".to_string(),
            to_address: "0xto".to_string(),
            token_address: None,
            amount: dec!(0.01),
            status: TxStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_history_order_and_limit() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..5 {
            store.add_transaction(&tx(1, &format!("0x{i}"))).await.unwrap();
        }
        store.add_transaction(&tx(2, "0xother")).await.unwrap();

        let history = store.list_transactions(1, Some(3)).await.unwrap();
        let hashes: Vec<&str> = history.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x4", "0x3", "0x2"]);
        assert_eq!(store.list_transactions(1, None).await.unwrap().len(), 5);
        assert_eq!(history[0].amount, dec!(0.01));
    }

    #[tokio::test]
    async fn test_status_update() {
        let store = Store::in_memory().await.unwrap();
        store.add_transaction(&tx(1, "0xabc")).await.unwrap();

        assert!(store.update_transaction_status("0xabc", TxStatus::Confirmed).await.unwrap());
        assert!(!store.update_transaction_status("0xmissing", TxStatus::Failed).await.unwrap());
        let history = store.list_transactions(1, None).await.unwrap();
        assert_eq!(history[0].status, TxStatus::Confirmed);
    }
}
