//! Command handling. The router turns one parsed command into one reply and
//! never talks to Telegram itself.

use crate::api::Message;
use crate::command::Command;
use crate::format;
use chainbot_core::error::BotError;
use chainbot_core::types::Chain;
use chainbot_engine::{JobSpec, StrategyScheduler};
use chainbot_store::{NewStrategy, SettingsUpdate, StoreError, StrategyRecord, UserSettings};
use chainbot_wallet::{WalletError, WalletManager};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Who sent a message, and where.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub private_chat: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl MessageContext {
    /// `None` for messages without a human sender.
    pub fn from_message(message: &Message) -> Option<Self> {
        let from = message.from.as_ref().filter(|u| !u.is_bot)?;
        Some(Self {
            chat_id: message.chat.id,
            message_id: message.message_id,
            user_id: from.id,
            private_chat: message.chat.is_private(),
            username: from.username.clone(),
            first_name: Some(from.first_name.clone()),
            last_name: from.last_name.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Delete the user's message; it carried a secret.
    pub delete_source: bool,
}

impl Reply {
    fn text(text: String) -> Self {
        Self {
            text,
            delete_source: false,
        }
    }
}

enum Failure {
    Wallet(WalletError),
    Store(StoreError),
    Engine(BotError),
    User(String),
}

impl From<WalletError> for Failure {
    fn from(e: WalletError) -> Self {
        Failure::Wallet(e)
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        Failure::Store(e)
    }
}

impl From<BotError> for Failure {
    fn from(e: BotError) -> Self {
        Failure::Engine(e)
    }
}

impl Failure {
    fn into_text(self, user_id: i64) -> String {
        match self {
            Failure::Wallet(e) => {
                if matches!(e, WalletError::Store(_) | WalletError::Io(_) | WalletError::Decryption) {
                    error!(user_id, error = %e, "wallet operation failed");
                }
                format::wallet_error(&e)
            }
            Failure::Store(e) => {
                error!(user_id, error = %e, "store operation failed");
                format::error("Something went wrong on our side. Please try again later.")
            }
            Failure::Engine(BotError::Validation(message)) => format::error(message),
            Failure::Engine(BotError::Strategy(e)) => format::error(e),
            Failure::Engine(e) => {
                error!(user_id, error = %e, "strategy operation failed");
                format::error("Could not start the strategy. Please try again later.")
            }
            Failure::User(message) => format::error(message),
        }
    }
}

type Handled = Result<String, Failure>;

/// Scheduler job for a stored strategy, limited by its owner's slippage
/// setting. The job id is the strategy id.
pub fn job_spec(record: &StrategyRecord, settings: &UserSettings) -> JobSpec {
    JobSpec {
        job_id: record.id,
        user_id: record.user_id,
        strategy_type: record.strategy_type.clone(),
        symbol: record.symbol.clone(),
        timeframe: record.timeframe,
        parameters: record.parameters.clone(),
        stop_loss_pct: record.stop_loss_pct,
        max_slippage_pct: Some(settings.max_slippage),
    }
}

pub struct Router {
    wallets: Arc<WalletManager>,
    scheduler: Arc<StrategyScheduler>,
    welcome: String,
    history_limit: u32,
}

impl Router {
    pub fn new(
        wallets: Arc<WalletManager>,
        scheduler: Arc<StrategyScheduler>,
        welcome: impl Into<String>,
        history_limit: u32,
    ) -> Self {
        Self {
            wallets,
            scheduler,
            welcome: welcome.into(),
            history_limit,
        }
    }

    /// Reply to a text message. `None` when the text is not a command.
    pub async fn handle_text(&self, ctx: &MessageContext, text: &str) -> Option<Reply> {
        // A malformed /addwallet may still hold a key.
        let sensitive = text.trim_start().to_lowercase().starts_with("/addwallet");
        let reply = match Command::parse(text)? {
            Ok(command) => self.dispatch(ctx, command).await,
            Err(e) => Reply::text(format::error(e)),
        };
        Some(Reply {
            delete_source: reply.delete_source || sensitive,
            ..reply
        })
    }

    pub async fn dispatch(&self, ctx: &MessageContext, command: Command) -> Reply {
        let delete_source = command.is_sensitive();
        let text = match self.ensure_user(ctx).await {
            Ok(()) => self
                .execute(ctx, command)
                .await
                .unwrap_or_else(|f| f.into_text(ctx.user_id)),
            Err(f) => f.into_text(ctx.user_id),
        };
        Reply {
            text,
            delete_source,
        }
    }

    async fn ensure_user(&self, ctx: &MessageContext) -> Result<(), Failure> {
        self.wallets
            .store()
            .upsert_user(
                ctx.user_id,
                ctx.username.as_deref(),
                ctx.first_name.as_deref(),
                ctx.last_name.as_deref(),
            )
            .await?;
        Ok(())
    }

    async fn chain_or_default(&self, user_id: i64, chain: Option<Chain>) -> Result<Chain, Failure> {
        match chain {
            Some(chain) => Ok(chain),
            None => Ok(self.wallets.settings(user_id).await?.default_chain),
        }
    }

    async fn execute(&self, ctx: &MessageContext, command: Command) -> Handled {
        let user = ctx.user_id;
        let wallets = &self.wallets;
        match command {
            Command::Start => {
                info!(user_id = user, "user started the bot");
                Ok(format!(
                    "{}\n\nSend /help to see what I can do.",
                    format::escape(&self.welcome)
                ))
            }
            Command::Help => Ok(format::help()),
            Command::AddWallet {
                name,
                chain,
                private_key,
            } => {
                if !ctx.private_chat {
                    return Err(Failure::User(
                        "For your safety, add wallets in a private chat with the bot".to_string(),
                    ));
                }
                let added = wallets.add_wallet(user, &name, &private_key, chain).await?;
                Ok(format::wallet_added(&added.wallet, &added.message))
            }
            Command::Wallets => Ok(format::wallets(&wallets.list_wallets(user).await?)),
            Command::RemoveWallet { name, chain } => {
                wallets.remove_wallet(user, &name, chain).await?;
                Ok(format!(
                    "🗑 Wallet '{}' removed from {}",
                    format::escape(&name),
                    chain
                ))
            }
            Command::Balance { name: None, .. } => {
                Ok(format::balances(&wallets.all_balances(user).await?))
            }
            Command::Balance {
                name: Some(name),
                chain,
            } => {
                let chain = self.chain_or_default(user, chain).await?;
                let result = wallets.wallet_balance(user, &name, chain).await?;
                Ok(format::balance(&result.wallet, &result.balance))
            }
            Command::Token { name, chain, token } => {
                let balance = wallets.token_balance(user, &name, chain, &token).await?;
                Ok(format::token_balance(&balance))
            }
            Command::Deposit { name, chain } => {
                let chain = self.chain_or_default(user, chain).await?;
                Ok(format::deposit(&wallets.deposit_address(user, &name, chain).await?))
            }
            Command::Send {
                name,
                chain,
                to,
                amount,
            } => {
                let receipt = wallets.send_native(user, &name, chain, &to, amount).await?;
                Ok(format::receipt(&receipt))
            }
            Command::SendToken {
                name,
                chain,
                token,
                to,
                amount,
            } => {
                let receipt = wallets
                    .send_token(user, &name, chain, &token, &to, amount)
                    .await?;
                Ok(format::receipt(&receipt))
            }
            Command::Gas {
                name,
                chain,
                to,
                amount,
                token,
            } => {
                let estimate = wallets
                    .estimate_gas(user, &name, chain, &to, amount, token.as_deref())
                    .await?;
                Ok(format::gas(&estimate))
            }
            Command::Tx { chain, hash } => {
                Ok(format::tx_status(&wallets.transaction_status(chain, &hash).await?))
            }
            Command::History => Ok(format::history(
                &wallets.history(user, Some(self.history_limit)).await?,
            )),
            Command::Settings => Ok(format::settings(&wallets.settings(user).await?)),
            Command::SetChain(chain) => {
                let update = SettingsUpdate {
                    default_chain: Some(chain),
                    ..SettingsUpdate::default()
                };
                Ok(format::settings(&wallets.update_settings(user, &update).await?))
            }
            Command::SetSlippage(pct) => {
                let update = SettingsUpdate {
                    max_slippage: Some(pct),
                    ..SettingsUpdate::default()
                };
                let settings = wallets.update_settings(user, &update).await?;
                self.restart_running(user).await?;
                Ok(format::settings(&settings))
            }
            Command::Notifications(on) => {
                let update = SettingsUpdate {
                    notifications: Some(on),
                    ..SettingsUpdate::default()
                };
                Ok(format::settings(&wallets.update_settings(user, &update).await?))
            }
            Command::Strategies => Ok(format::strategy_catalog(&self.scheduler.registry().list())),
            Command::AddStrategy {
                strategy_type,
                symbol,
                timeframe,
                parameters,
            } => {
                let registry = self.scheduler.registry();
                let Some(info) = registry.get(&strategy_type) else {
                    return Err(Failure::User(format!(
                        "Unknown strategy '{strategy_type}'. Available: {}",
                        registry.names().join(", ")
                    )));
                };
                registry
                    .create(&strategy_type, parameters.clone(), vec![symbol.clone()])
                    .map_err(|e| Failure::User(format!("Invalid parameters: {e}")))?;
                let record = wallets
                    .store()
                    .add_strategy(&NewStrategy {
                        user_id: user,
                        name: info.name.clone(),
                        strategy_type,
                        symbol,
                        timeframe,
                        parameters,
                        stop_loss_pct: None,
                    })
                    .await?;
                info!(user_id = user, strategy_id = record.id, "strategy added");
                Ok(format!(
                    "✅ Strategy #{} saved: {} {} {}\nStart it with /startstrategy {}",
                    record.id,
                    format::escape(&record.name),
                    format::escape(&record.symbol),
                    record.timeframe,
                    record.id
                ))
            }
            Command::MyStrategies => {
                let records = wallets.store().list_strategies(user).await?;
                let mut running = Vec::with_capacity(records.len());
                for record in &records {
                    running.push(self.scheduler.is_running(record.id).await);
                }
                Ok(format::my_strategies(&records, &running))
            }
            Command::StartStrategy(id) => {
                let record = self.own_strategy(user, id).await?;
                self.scheduler.start(self.spec_for(&record).await?).await?;
                wallets.store().set_strategy_active(user, id, true).await?;
                Ok(format!(
                    "▶️ Strategy #{id} started on {} {}. Paper trades are reported here.",
                    format::escape(&record.symbol),
                    record.timeframe
                ))
            }
            Command::StopStrategy(id) => {
                self.own_strategy(user, id).await?;
                let was_running = self.scheduler.stop(id).await;
                wallets.store().set_strategy_active(user, id, false).await?;
                Ok(if was_running {
                    format!("⏹ Strategy #{id} stopped")
                } else {
                    format!("Strategy #{id} was not running")
                })
            }
            Command::RemoveStrategy(id) => {
                self.own_strategy(user, id).await?;
                self.scheduler.stop(id).await;
                wallets.store().remove_strategy(user, id).await?;
                Ok(format!("🗑 Strategy #{id} removed"))
            }
            Command::StopLoss { id, pct } => {
                self.own_strategy(user, id).await?;
                wallets.store().set_strategy_stop_loss(user, id, pct).await?;
                // A running job keeps its old stop until restarted.
                if self.scheduler.stop(id).await {
                    let record = self.own_strategy(user, id).await?;
                    if let Err(e) = self.scheduler.start(self.spec_for(&record).await?).await {
                        warn!(strategy_id = id, error = %e, "restart after stop-loss change failed");
                        wallets.store().set_strategy_active(user, id, false).await?;
                        return Err(e.into());
                    }
                }
                Ok(match pct {
                    Some(pct) => format!("🛡 Stop-loss for strategy #{id} set to {pct}%"),
                    None => format!("🛡 Stop-loss for strategy #{id} removed"),
                })
            }
            Command::Portfolio => {
                let entries = wallets.store().list_portfolio(user).await?;
                let infos = wallets.list_wallets(user).await?;
                Ok(format::portfolio(&entries, &infos))
            }
            Command::Trades => Ok(format::paper_trades(
                &wallets
                    .store()
                    .list_paper_trades(user, self.history_limit)
                    .await?,
            )),
        }
    }

    /// Restart every strategy stored as active. Ones that fail to start are
    /// marked inactive. Returns how many are running.
    pub async fn resume_strategies(&self) -> Result<usize, StoreError> {
        let store = self.wallets.store();
        let mut started = 0;
        for record in store.active_strategies().await? {
            let spec = self.spec_for(&record).await?;
            match self.scheduler.start(spec).await {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!(strategy_id = record.id, error = %e, "could not resume strategy");
                    store
                        .set_strategy_active(record.user_id, record.id, false)
                        .await?;
                }
            }
        }
        info!(started, "active strategies resumed");
        Ok(started)
    }

    /// Restart the user's running jobs so they pick up changed settings.
    async fn restart_running(&self, user_id: i64) -> Result<(), Failure> {
        let store = self.wallets.store();
        for record in store.list_strategies(user_id).await? {
            if !self.scheduler.stop(record.id).await {
                continue;
            }
            if let Err(e) = self.scheduler.start(self.spec_for(&record).await?).await {
                warn!(strategy_id = record.id, error = %e, "restart after settings change failed");
                store.set_strategy_active(user_id, record.id, false).await?;
            }
        }
        Ok(())
    }

    async fn spec_for(&self, record: &StrategyRecord) -> Result<JobSpec, StoreError> {
        let settings = self.wallets.store().get_settings(record.user_id).await?;
        Ok(job_spec(record, &settings))
    }

    async fn own_strategy(&self, user_id: i64, id: i64) -> Result<StrategyRecord, Failure> {
        self.wallets
            .store()
            .get_strategy(user_id, id)
            .await?
            .ok_or_else(|| Failure::User(format!("Strategy #{id} not found")))
    }
}
