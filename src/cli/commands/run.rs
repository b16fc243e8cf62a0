//! Telegram bot command.

use super::{binance_config, client_options, scheduler_config};
use anyhow::{Context, Result};
use chainbot_chain::ChainClients;
use chainbot_config::AppConfig;
use chainbot_core::traits::Notifier;
use chainbot_data::BinanceMarketData;
use chainbot_engine::StrategyScheduler;
use chainbot_store::Store;
use chainbot_telegram::{pump_events, Bot, Router, TelegramApi, TelegramNotifier};
use chainbot_wallet::{KeyVault, WalletManager};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config: AppConfig) -> Result<()> {
    let token = config.telegram.token().with_context(|| {
        format!(
            "{} is not set; the bot needs a Telegram token",
            config.telegram.token_env
        )
    })?;

    let store = Store::connect(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    let vault = KeyVault::load(
        config.security.encryption_key().as_deref(),
        Path::new(&config.security.key_file),
    )
    .context("Failed to load the encryption key")?;
    let chains = ChainClients::connect(config.chains.endpoints(), client_options(&config))
        .context("Failed to set up chain clients")?;
    info!(chains = ?chains.chains(), "chains configured");
    let wallets = Arc::new(WalletManager::new(store.clone(), Arc::new(vault), chains));

    let market = Arc::new(BinanceMarketData::new(binance_config(&config))?);
    let (scheduler, events) = StrategyScheduler::new(market, scheduler_config(&config));
    let scheduler = Arc::new(scheduler);

    let poll_timeout = config.telegram.poll_timeout_secs;
    let api = Arc::new(TelegramApi::new(
        &config.telegram.api_url,
        &token,
        Duration::from_secs(poll_timeout),
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(Arc::clone(&api)));

    let pump_shutdown = CancellationToken::new();
    let pump = tokio::spawn(pump_events(
        events,
        store.clone(),
        notifier,
        pump_shutdown.clone(),
    ));

    let router = Arc::new(Router::new(
        wallets,
        Arc::clone(&scheduler),
        config.telegram.welcome_message.clone(),
        config.telegram.history_limit,
    ));
    let bot = Bot::new(api, router, poll_timeout);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "could not listen for Ctrl-C"),
            }
        }
    });

    info!(database = %config.database.path, "chainbot running");
    let result = bot.run(shutdown.clone()).await;

    // Stop jobs before the pump so their last events are still recorded.
    scheduler.shutdown().await;
    pump_shutdown.cancel();
    if let Err(e) = pump.await {
        warn!(error = %e, "event pump ended abnormally");
    }
    store.close().await;

    result.context("Telegram bot stopped with an error")
}
