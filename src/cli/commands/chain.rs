//! One-off chain lookups.

use super::{client_options, parse_chain};
use crate::cli::{BalanceArgs, TxStatusArgs};
use anyhow::{Context, Result};
use chainbot_chain::ChainClients;
use chainbot_config::AppConfig;
use chainbot_core::types::Chain;

fn connect(config: &AppConfig, chain: Chain) -> Result<ChainClients> {
    let url = config.chains.rpc_url(chain);
    if url.trim().is_empty() {
        anyhow::bail!("No RPC URL configured for {chain}");
    }
    ChainClients::connect([(chain, url)], client_options(config))
        .with_context(|| format!("Failed to connect to {chain}"))
}

pub async fn balance(args: BalanceArgs, config: AppConfig) -> Result<()> {
    let chain = parse_chain(&args.chain)?;
    let clients = connect(&config, chain)?;

    match &args.token {
        Some(token) => {
            let balance = clients.evm(chain)?.token_balance(&args.address, token).await?;
            println!("Chain:   {}", balance.chain);
            println!("Wallet:  {}", balance.wallet_address);
            println!("Token:   {}", balance.token_address);
            println!("Balance: {} {}", balance.balance.normalize(), balance.symbol);
        }
        None => {
            let balance = clients.get(chain)?.native_balance(&args.address).await?;
            println!("Chain:   {}", balance.chain);
            println!("Address: {}", balance.address);
            println!("Balance: {} {}", balance.balance.normalize(), balance.symbol);
            println!("Raw:     {}", balance.raw);
        }
    }
    Ok(())
}

pub async fn tx_status(args: TxStatusArgs, config: AppConfig) -> Result<()> {
    let chain = parse_chain(&args.chain)?;
    let clients = connect(&config, chain)?;
    let report = clients.get(chain)?.transaction_status(&args.hash).await?;

    println!("Chain:         {}", report.chain);
    println!("Transaction:   {}", report.tx_hash);
    println!("Status:        {}", report.status);
    if let Some(block) = report.block_number {
        println!("Block:         {block}");
    }
    println!("Confirmations: {}", report.confirmations);
    if let Some(fee) = report.fee {
        println!("Fee:           {} {}", fee.normalize(), chain.native_symbol());
    }
    println!("Explorer:      {}", chain.explorer_tx_url(&report.tx_hash));
    Ok(())
}
