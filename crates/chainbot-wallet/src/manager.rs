//! Wallet operations on behalf of bot users.

use crate::error::{WalletError, WalletResult};
use crate::keys::{derive_address, validate_private_key};
use crate::vault::KeyVault;
use chainbot_chain::ChainClients;
use chainbot_core::traits::ChainClient;
use chainbot_core::types::{
    Chain, GasEstimate, NativeBalance, TokenBalance, TransferReceipt, TxStatusReport,
};
use chainbot_store::{
    NewTransaction, NewWallet, SettingsUpdate, Store, StoreError, TransactionRecord, UserSettings,
    WalletRecord,
};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const MAX_NAME_LEN: usize = 32;

/// Upper bound for the per-user slippage setting, in percent.
pub const MAX_SLIPPAGE_PCT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Public view of a stored wallet. Never carries key material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletInfo {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub chain: Chain,
    pub balance: Option<Decimal>,
    pub created_at: i64,
}

impl From<&WalletRecord> for WalletInfo {
    fn from(record: &WalletRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            address: record.address.clone(),
            chain: record.chain,
            balance: record.balance,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddedWallet {
    pub wallet: WalletInfo,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub wallet: WalletInfo,
    pub balance: NativeBalance,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositInfo {
    pub address: String,
    pub chain: Chain,
    pub note: String,
}

/// Wallet service. Keys are decrypted only for the duration of a send.
pub struct WalletManager {
    store: Store,
    vault: Arc<KeyVault>,
    chains: ChainClients,
}

impl WalletManager {
    pub fn new(store: Store, vault: Arc<KeyVault>, chains: ChainClients) -> Self {
        Self {
            store,
            vault,
            chains,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn chains(&self) -> &ChainClients {
        &self.chains
    }

    async fn require_wallet(&self, user_id: i64, name: &str, chain: Chain) -> WalletResult<WalletRecord> {
        self.store
            .find_wallet(user_id, name, chain)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound {
                name: name.to_string(),
                chain,
            })
    }

    /// Import a wallet from its private key. The key is stored encrypted.
    pub async fn add_wallet(
        &self,
        user_id: i64,
        name: &str,
        private_key: &str,
        chain: Chain,
    ) -> WalletResult<AddedWallet> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(WalletError::InvalidName(format!(
                "use 1 to {MAX_NAME_LEN} characters"
            )));
        }
        let key = validate_private_key(private_key, chain)?;
        let address = derive_address(&key)?;

        let record = self
            .store
            .add_wallet(&NewWallet {
                user_id,
                name: name.to_string(),
                address,
                encrypted_private_key: self.vault.encrypt(&key),
                chain,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => WalletError::DuplicateWallet {
                    name: name.to_string(),
                    chain,
                },
                other => other.into(),
            })?;

        info!(user_id, chain = %chain, address = %record.address, "wallet added");
        Ok(AddedWallet {
            wallet: WalletInfo::from(&record),
            message: format!("Wallet '{name}' added successfully"),
        })
    }

    /// Newest first.
    pub async fn list_wallets(&self, user_id: i64) -> WalletResult<Vec<WalletInfo>> {
        let wallets = self.store.list_wallets(user_id).await?;
        Ok(wallets.iter().map(WalletInfo::from).collect())
    }

    pub async fn remove_wallet(&self, user_id: i64, name: &str, chain: Chain) -> WalletResult<()> {
        if !self.store.remove_wallet(user_id, name, chain).await? {
            return Err(WalletError::WalletNotFound {
                name: name.to_string(),
                chain,
            });
        }
        info!(user_id, chain = %chain, "wallet removed");
        Ok(())
    }

    /// Fetch the native balance and cache it on the wallet and portfolio.
    pub async fn wallet_balance(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
    ) -> WalletResult<WalletBalance> {
        let wallet = self.require_wallet(user_id, name, chain).await?;
        self.refresh_balance(&wallet).await
    }

    async fn refresh_balance(&self, wallet: &WalletRecord) -> WalletResult<WalletBalance> {
        let client = self.chains.get(wallet.chain)?;
        let balance = client.native_balance(&wallet.address).await?;

        self.store
            .update_wallet_balance(wallet.id, balance.balance, &balance.raw)
            .await?;
        self.store
            .upsert_portfolio(wallet.user_id, wallet.id, &balance.symbol, None, balance.balance)
            .await?;

        let mut info = WalletInfo::from(wallet);
        info.balance = Some(balance.balance);
        Ok(WalletBalance {
            wallet: info,
            balance,
        })
    }

    /// Balances of every wallet of the user, fetched concurrently. A failing
    /// wallet is reported in its slot and does not affect the others.
    pub async fn all_balances(
        &self,
        user_id: i64,
    ) -> WalletResult<Vec<(WalletInfo, WalletResult<NativeBalance>)>> {
        let wallets = self.store.list_wallets(user_id).await?;
        let results = join_all(wallets.iter().map(|w| self.refresh_balance(w))).await;

        Ok(wallets
            .iter()
            .zip(results)
            .map(|(wallet, result)| match result {
                Ok(fetched) => (fetched.wallet, Ok(fetched.balance)),
                Err(e) => {
                    warn!(user_id, wallet_id = wallet.id, error = %e, "balance fetch failed");
                    (WalletInfo::from(wallet), Err(e))
                }
            })
            .collect())
    }

    pub async fn token_balance(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
        token: &str,
    ) -> WalletResult<TokenBalance> {
        let wallet = self.require_wallet(user_id, name, chain).await?;
        let balance = self
            .chains
            .evm(chain)?
            .token_balance(&wallet.address, token)
            .await?;
        self.store
            .upsert_portfolio(
                user_id,
                wallet.id,
                &balance.symbol,
                Some(&balance.token_address),
                balance.balance,
            )
            .await?;
        Ok(balance)
    }

    pub async fn deposit_address(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
    ) -> WalletResult<DepositInfo> {
        let wallet = self.require_wallet(user_id, name, chain).await?;
        Ok(DepositInfo {
            address: wallet.address,
            chain,
            note: format!("Send {} to this address", chain.native_symbol()),
        })
    }

    /// Estimate a transfer from the named wallet. `token` selects an ERC-20
    /// transfer instead of a native one.
    pub async fn estimate_gas(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
        to: &str,
        amount: Decimal,
        token: Option<&str>,
    ) -> WalletResult<GasEstimate> {
        check_amount(amount)?;
        let wallet = self.require_wallet(user_id, name, chain).await?;
        let client = self.chains.evm(chain)?;
        let estimate = match token {
            Some(token) => {
                client
                    .estimate_token_transfer(&wallet.address, token, to, amount)
                    .await?
            }
            None => {
                client
                    .estimate_native_transfer(&wallet.address, to, amount)
                    .await?
            }
        };
        Ok(estimate)
    }

    /// Send the chain's native coin and record the transaction.
    pub async fn send_native(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
        to: &str,
        amount: Decimal,
    ) -> WalletResult<TransferReceipt> {
        check_amount(amount)?;
        let client = self.chains.evm(chain)?;
        client.validate_address(to)?;
        let wallet = self.require_wallet(user_id, name, chain).await?;

        let key = self.vault.decrypt(&wallet.encrypted_private_key)?;
        let receipt = client.send_native(&key, to, amount).await?;
        drop(key);

        self.record(user_id, &wallet, "native", &receipt).await;
        info!(user_id, chain = %chain, tx_hash = %receipt.tx_hash, status = %receipt.status, "native transfer sent");
        Ok(receipt)
    }

    /// Send an ERC-20 token and record the transaction.
    pub async fn send_token(
        &self,
        user_id: i64,
        name: &str,
        chain: Chain,
        token: &str,
        to: &str,
        amount: Decimal,
    ) -> WalletResult<TransferReceipt> {
        check_amount(amount)?;
        let client = self.chains.evm(chain)?;
        client.validate_address(token)?;
        client.validate_address(to)?;
        let wallet = self.require_wallet(user_id, name, chain).await?;

        let key = self.vault.decrypt(&wallet.encrypted_private_key)?;
        let receipt = client.send_token(&key, token, to, amount).await?;
        drop(key);

        self.record(user_id, &wallet, "token", &receipt).await;
        info!(user_id, chain = %chain, tx_hash = %receipt.tx_hash, status = %receipt.status, "token transfer sent");
        Ok(receipt)
    }

    /// Store a broadcast transfer. A failure here is logged and swallowed:
    /// the transfer already happened and the caller must still see it.
    async fn record(
        &self,
        user_id: i64,
        wallet: &WalletRecord,
        kind: &str,
        receipt: &TransferReceipt,
    ) -> Option<TransactionRecord> {
        let stored = self
            .store
            .add_transaction(&NewTransaction {
                user_id,
                wallet_id: Some(wallet.id),
                chain: receipt.chain,
                tx_hash: receipt.tx_hash.clone(),
                kind: kind.to_string(),
                from_address: receipt.from.clone(),
                to_address: receipt.to.clone(),
                token_address: receipt.token_address.clone(),
                amount: receipt.amount,
                status: receipt.status,
            })
            .await;
        match stored {
            Ok(record) => Some(record),
            Err(e) => {
                error!(
                    user_id,
                    chain = %receipt.chain,
                    tx_hash = %receipt.tx_hash,
                    error = %e,
                    "transfer sent but not recorded"
                );
                None
            }
        }
    }

    /// Query the chain and bring any stored copy of the transaction up to date.
    pub async fn transaction_status(&self, chain: Chain, tx_hash: &str) -> WalletResult<TxStatusReport> {
        let report = self.chains.get(chain)?.transaction_status(tx_hash).await?;
        self.store
            .update_transaction_status(&report.tx_hash, report.status)
            .await?;
        Ok(report)
    }

    pub async fn history(&self, user_id: i64, limit: Option<u32>) -> WalletResult<Vec<TransactionRecord>> {
        Ok(self.store.list_transactions(user_id, limit).await?)
    }

    pub async fn settings(&self, user_id: i64) -> WalletResult<UserSettings> {
        Ok(self.store.get_settings(user_id).await?)
    }

    pub async fn update_settings(
        &self,
        user_id: i64,
        update: &SettingsUpdate,
    ) -> WalletResult<UserSettings> {
        if let Some(slippage) = update.max_slippage {
            if slippage <= Decimal::ZERO || slippage > MAX_SLIPPAGE_PCT {
                return Err(WalletError::InvalidSettings(format!(
                    "slippage must be above 0 and at most {MAX_SLIPPAGE_PCT}%"
                )));
            }
        }
        Ok(self.store.update_settings(user_id, update).await?)
    }
}

fn check_amount(amount: Decimal) -> WalletResult<()> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainbot_core::error::ChainError;
    use chainbot_core::traits::ChainClient;
    use chainbot_core::types::TxStatus;
    use rust_decimal_macros::dec;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    /// Answers balance and status reads without a network.
    struct FakeChain {
        chain: Chain,
        fail: bool,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        fn chain(&self) -> Chain {
            self.chain
        }

        fn validate_address(&self, _address: &str) -> Result<(), ChainError> {
            Ok(())
        }

        async fn native_balance(&self, address: &str) -> Result<NativeBalance, ChainError> {
            if self.fail {
                return Err(ChainError::Rpc("node down".into()));
            }
            Ok(NativeBalance {
                chain: self.chain,
                address: address.to_string(),
                symbol: self.chain.native_symbol().to_string(),
                balance: dec!(1.5),
                raw: "1500000000000000000".to_string(),
            })
        }

        async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatusReport, ChainError> {
            Ok(TxStatusReport {
                chain: self.chain,
                tx_hash: tx_hash.to_string(),
                status: TxStatus::Confirmed,
                block_number: Some(10),
                confirmations: 3,
                gas_used: Some(21_000),
                effective_gas_price: Some(1),
                fee: None,
            })
        }
    }

    async fn manager() -> WalletManager {
        let store = Store::in_memory().await.unwrap();
        let vault = Arc::new(KeyVault::from_key(&KeyVault::generate_key()).unwrap());
        let mut chains = ChainClients::default();
        chains.register(Arc::new(FakeChain {
            chain: Chain::Ethereum,
            fail: false,
        }));
        chains.register(Arc::new(FakeChain {
            chain: Chain::Bsc,
            fail: true,
        }));
        WalletManager::new(store, vault, chains)
    }

    #[tokio::test]
    async fn test_add_wallet_encrypts_key() {
        let manager = manager().await;
        let added = manager.add_wallet(1, "main", KEY, Chain::Ethereum).await.unwrap();

        assert_eq!(added.wallet.address, ADDRESS);
        assert_eq!(added.message, "Wallet 'main' added successfully");

        let record = manager
            .store()
            .find_wallet(1, "main", Chain::Ethereum)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.encrypted_private_key.contains(&KEY[2..]));
        assert_eq!(
            manager.vault.decrypt(&record.encrypted_private_key).unwrap(),
            &KEY[2..]
        );
    }

    #[tokio::test]
    async fn test_add_wallet_errors() {
        let manager = manager().await;
        manager.add_wallet(1, "main", KEY, Chain::Ethereum).await.unwrap();

        assert!(matches!(
            manager.add_wallet(1, "main", KEY, Chain::Ethereum).await,
            Err(WalletError::DuplicateWallet { .. })
        ));
        assert!(matches!(
            manager.add_wallet(1, "sol", KEY, Chain::Solana).await,
            Err(WalletError::UnsupportedChain(Chain::Solana))
        ));
        assert!(matches!(
            manager.add_wallet(1, "bad", "0x1234", Chain::Ethereum).await,
            Err(WalletError::InvalidPrivateKey)
        ));
        assert!(matches!(
            manager.add_wallet(1, "  ", KEY, Chain::Ethereum).await,
            Err(WalletError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_wallet() {
        let manager = manager().await;
        manager.add_wallet(1, "main", KEY, Chain::Ethereum).await.unwrap();
        manager.remove_wallet(1, "main", Chain::Ethereum).await.unwrap();
        assert!(matches!(
            manager.remove_wallet(1, "main", Chain::Ethereum).await,
            Err(WalletError::WalletNotFound { .. })
        ));
        assert!(manager.list_wallets(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_is_cached() {
        let manager = manager().await;
        manager.add_wallet(1, "main", KEY, Chain::Ethereum).await.unwrap();

        let fetched = manager.wallet_balance(1, "main", Chain::Ethereum).await.unwrap();
        assert_eq!(fetched.balance.balance, dec!(1.5));
        assert_eq!(fetched.wallet.balance, Some(dec!(1.5)));

        let listed = manager.list_wallets(1).await.unwrap();
        assert_eq!(listed[0].balance, Some(dec!(1.5)));

        let portfolio = manager.store().list_portfolio(1).await.unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio[0].symbol, "ETH");
    }

    #[tokio::test]
    async fn test_all_balances_reports_failures() {
        let manager = manager().await;
        manager.add_wallet(1, "eth", KEY, Chain::Ethereum).await.unwrap();
        manager.add_wallet(1, "bnb", KEY, Chain::Bsc).await.unwrap();
        manager.add_wallet(1, "poly", KEY, Chain::Polygon).await.unwrap();

        let results = manager.all_balances(1).await.unwrap();
        assert_eq!(results.len(), 3);
        let ok: Vec<&str> = results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(w, _)| w.name.as_str())
            .collect();
        assert_eq!(ok, vec!["eth"]);
    }

    #[tokio::test]
    async fn test_deposit_address() {
        let manager = manager().await;
        manager.add_wallet(1, "main", KEY, Chain::Bsc).await.unwrap();
        let deposit = manager.deposit_address(1, "main", Chain::Bsc).await.unwrap();
        assert_eq!(deposit.address, ADDRESS);
        assert_eq!(deposit.note, "Send BNB to this address");
    }

    #[tokio::test]
    async fn test_send_validates_before_touching_keys() {
        let manager = manager().await;
        assert!(matches!(
            manager
                .send_native(1, "main", Chain::Ethereum, ADDRESS, dec!(0))
                .await,
            Err(WalletError::InvalidAmount(_))
        ));
        // No EVM client is configured in the fake set.
        assert!(matches!(
            manager
                .send_native(1, "main", Chain::Ethereum, ADDRESS, dec!(1))
                .await,
            Err(WalletError::Chain(ChainError::UnsupportedChain(_)))
        ));
    }

    #[tokio::test]
    async fn test_transaction_status_updates_history() {
        let manager = manager().await;
        manager
            .store()
            .add_transaction(&NewTransaction {
                user_id: 1,
                wallet_id: None,
                chain: Chain::Ethereum,
                tx_hash: "0xabc".into(),
                kind: "native".into(),
                from_address: ADDRESS.into(),
                to_address: ADDRESS.into(),
                token_address: None,
                amount: dec!(0.1),
                status: TxStatus::Pending,
            })
            .await
            .unwrap();

        let report = manager.transaction_status(Chain::Ethereum, "0xabc").await.unwrap();
        assert_eq!(report.confirmations, 3);
        let history = manager.history(1, None).await.unwrap();
        assert_eq!(history[0].status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_unrecorded_transfer_is_not_an_error() {
        let manager = manager().await;
        manager.add_wallet(1, "main", KEY, Chain::Ethereum).await.unwrap();
        let wallet = manager
            .store()
            .find_wallet(1, "main", Chain::Ethereum)
            .await
            .unwrap()
            .unwrap();
        let receipt = TransferReceipt {
            chain: Chain::Ethereum,
            tx_hash: "0xfeed".into(),
            from: ADDRESS.into(),
            to: ADDRESS.into(),
            amount: dec!(0.1),
            symbol: "ETH".into(),
            token_address: None,
            status: TxStatus::Confirmed,
            gas_used: Some(21_000),
            gas_price: 1,
            fee: None,
            block_number: Some(5),
        };
        assert!(manager.record(1, &wallet, "native", &receipt).await.is_some());

        manager.store().close().await;
        assert!(manager.record(1, &wallet, "native", &receipt).await.is_none());
    }

    #[tokio::test]
    async fn test_sol_send_is_unsupported() {
        let manager = manager().await;
        let result = manager
            .send_native(1, "main", Chain::Solana, "11111111111111111111111111111111", dec!(1))
            .await;
        assert!(matches!(
            result,
            Err(WalletError::Chain(ChainError::Unsupported(_)))
        ));
    }

    #[tokio::test]
    async fn test_slippage_bounds() {
        let manager = manager().await;
        for bad in [dec!(0), dec!(-1), dec!(50.1)] {
            let update = SettingsUpdate {
                max_slippage: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                manager.update_settings(1, &update).await,
                Err(WalletError::InvalidSettings(_))
            ));
        }
        let update = SettingsUpdate {
            max_slippage: Some(dec!(50)),
            ..Default::default()
        };
        assert_eq!(
            manager.update_settings(1, &update).await.unwrap().max_slippage,
            dec!(50)
        );
    }
}
