//! Paper trading command implementation.

use super::{binance_config, parse_params, parse_timeframe, scheduler_config};
use crate::cli::PaperArgs;
use anyhow::{Context, Result};
use chainbot_config::AppConfig;
use chainbot_data::BinanceMarketData;
use chainbot_engine::{EventKind, JobSpec, StrategyScheduler};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: PaperArgs, config: AppConfig) -> Result<()> {
    let timeframe = parse_timeframe(&args.timeframe)?;
    let parameters = parse_params(args.params.as_deref())?;
    let symbol = args.symbol.to_uppercase();

    let market = Arc::new(BinanceMarketData::new(binance_config(&config))?);
    let scheduler_config = scheduler_config(&config);
    let capital = scheduler_config.paper.initial_capital;
    let (scheduler, mut events) = StrategyScheduler::new(market, scheduler_config);

    scheduler
        .start(JobSpec {
            job_id: 1,
            user_id: 0,
            strategy_type: args.strategy.clone(),
            symbol: symbol.clone(),
            timeframe,
            parameters,
            stop_loss_pct: args.stop_loss,
            max_slippage_pct: None,
        })
        .await
        .context("Failed to start strategy")?;

    info!(
        strategy = %args.strategy,
        symbol = %symbol,
        timeframe = %timeframe,
        capital = %capital,
        "paper trading started, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match &event.kind {
                    EventKind::Opened { quantity, price, stop_price } => info!(
                        time = %event.datetime(),
                        quantity = %quantity,
                        price = %price,
                        stop = ?stop_price,
                        "opened"
                    ),
                    EventKind::Closed { quantity, price, pnl, reason } => info!(
                        time = %event.datetime(),
                        quantity = %quantity,
                        price = %price,
                        pnl = %pnl,
                        reason = %reason,
                        "closed"
                    ),
                    EventKind::Rejected { reason } => warn!(time = %event.datetime(), reason = %reason, "signal rejected"),
                    EventKind::Failed { message } => warn!(time = %event.datetime(), message = %message, "job error"),
                }
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
