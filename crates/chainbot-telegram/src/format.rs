//! Reply texts. Everything user-controlled goes through [`escape`] because
//! messages are sent with HTML parse mode.

use crate::command::USAGE;
use chainbot_core::types::{
    GasEstimate, NativeBalance, TokenBalance, TransferReceipt, TxStatus, TxStatusReport,
};
use chainbot_engine::{EngineEvent, EventKind};
use chainbot_store::{PaperTradeRecord, PortfolioEntry, StrategyRecord, TransactionRecord, UserSettings};
use chainbot_strategies::StrategyInfo;
use chainbot_wallet::{DepositInfo, WalletError, WalletInfo, WalletResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Write;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn error(message: impl std::fmt::Display) -> String {
    format!("❌ {}", escape(&message.to_string()))
}

fn time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Trailing zeros stripped, capped at 8 decimal places.
fn amount(value: Decimal) -> String {
    value.round_dp(8).normalize().to_string()
}

fn status_icon(status: TxStatus) -> &'static str {
    match status {
        TxStatus::Pending => "⏳",
        TxStatus::Confirmed => "✅",
        TxStatus::Failed => "❌",
    }
}

pub fn help() -> String {
    let mut text = String::from("<b>Commands</b>\n");
    for (_, usage) in USAGE {
        let _ = writeln!(text, "{}", escape(usage));
    }
    text.push_str("\nChains: ethereum, base, bsc, polygon, solana");
    text
}

pub fn wallet_added(wallet: &WalletInfo, message: &str) -> String {
    format!(
        "✅ {}\nChain: {}\nAddress: <code>{}</code>",
        escape(message),
        wallet.chain,
        wallet.address
    )
}

pub fn wallets(wallets: &[WalletInfo]) -> String {
    if wallets.is_empty() {
        return "You have no wallets yet. Add one with /addwallet".to_string();
    }
    let mut text = String::from("<b>Your wallets</b>\n");
    for w in wallets {
        let _ = write!(
            text,
            "\n<b>{}</b> ({})\n<code>{}</code>\n",
            escape(&w.name),
            w.chain,
            w.address
        );
        if let Some(balance) = w.balance {
            let _ = writeln!(text, "Last balance: {} {}", amount(balance), w.chain.native_symbol());
        }
    }
    text
}

pub fn balance(wallet: &WalletInfo, balance: &NativeBalance) -> String {
    format!(
        "💰 <b>{}</b> ({})\n{} {}",
        escape(&wallet.name),
        wallet.chain,
        amount(balance.balance),
        balance.symbol
    )
}

pub fn balances(results: &[(WalletInfo, WalletResult<NativeBalance>)]) -> String {
    if results.is_empty() {
        return "You have no wallets yet. Add one with /addwallet".to_string();
    }
    let mut text = String::from("💰 <b>Balances</b>\n");
    for (wallet, result) in results {
        let line = match result {
            Ok(b) => format!("{} {}", amount(b.balance), b.symbol),
            Err(e) => format!("unavailable ({})", escape(&e.to_string())),
        };
        let _ = write!(text, "\n<b>{}</b> ({}): {}", escape(&wallet.name), wallet.chain, line);
    }
    text
}

pub fn token_balance(balance: &TokenBalance) -> String {
    format!(
        "🪙 {} {}\nToken: <code>{}</code>\nWallet: <code>{}</code>",
        amount(balance.balance),
        escape(&balance.symbol),
        balance.token_address,
        balance.wallet_address
    )
}

pub fn deposit(info: &DepositInfo) -> String {
    format!(
        "📥 <b>Deposit on {}</b>\n<code>{}</code>\n{}",
        info.chain,
        info.address,
        escape(&info.note)
    )
}

pub fn gas(estimate: &GasEstimate) -> String {
    let gwei = Decimal::from_i128_with_scale(estimate.gas_price as i128, 9);
    format!(
        "⛽ <b>Gas estimate on {}</b>\nGas limit: {}\nGas price: {} gwei\nMax fee: {} {}{}",
        estimate.chain,
        estimate.gas_limit,
        amount(gwei),
        amount(estimate.total_cost),
        estimate.symbol,
        if estimate.is_token_transfer { "\n(token transfer)" } else { "" }
    )
}

pub fn receipt(receipt: &TransferReceipt) -> String {
    let mut text = format!(
        "{} Sent {} {} to <code>{}</code>\nStatus: {}\nTx: <a href=\"{}\">{}</a>",
        status_icon(receipt.status),
        amount(receipt.amount),
        escape(&receipt.symbol),
        receipt.to,
        receipt.status,
        receipt.chain.explorer_tx_url(&receipt.tx_hash),
        receipt.tx_hash
    );
    if let Some(fee) = receipt.fee {
        let _ = write!(text, "\nFee: {} {}", amount(fee), receipt.chain.native_symbol());
    }
    text
}

pub fn tx_status(report: &TxStatusReport) -> String {
    let mut text = format!(
        "{} <b>{}</b> on {}\n<a href=\"{}\">{}</a>",
        status_icon(report.status),
        report.status,
        report.chain,
        report.chain.explorer_tx_url(&report.tx_hash),
        report.tx_hash
    );
    if let Some(block) = report.block_number {
        let _ = write!(text, "\nBlock: {block}\nConfirmations: {}", report.confirmations);
    }
    if let Some(fee) = report.fee {
        let _ = write!(text, "\nFee: {} {}", amount(fee), report.chain.native_symbol());
    }
    text
}

pub fn history(records: &[TransactionRecord]) -> String {
    if records.is_empty() {
        return "No transactions yet.".to_string();
    }
    let mut text = String::from("📜 <b>Recent transactions</b>\n");
    for tx in records {
        let _ = write!(
            text,
            "\n{} {} {} on {} to <code>{}</code>\n{} <a href=\"{}\">view</a>\n",
            status_icon(tx.status),
            amount(tx.amount),
            tx.kind,
            tx.chain,
            tx.to_address,
            time(tx.created_at),
            tx.chain.explorer_tx_url(&tx.tx_hash)
        );
    }
    text
}

pub fn settings(settings: &UserSettings) -> String {
    format!(
        "⚙️ <b>Settings</b>\nDefault chain: {}\nMax slippage: {}%\nNotifications: {}",
        settings.default_chain,
        amount(settings.max_slippage),
        if settings.notifications { "on" } else { "off" }
    )
}

pub fn strategy_catalog(infos: &[&StrategyInfo]) -> String {
    let mut text = String::from("📈 <b>Available strategies</b>\n");
    for info in infos {
        let _ = write!(
            text,
            "\n<b>{}</b> <code>{}</code>\n{}\nDefaults: <code>{}</code>\n",
            escape(&info.name),
            info.key,
            escape(&info.description),
            escape(&info.default_config.to_string())
        );
    }
    text.push_str("\nAdd one with /addstrategy &lt;type&gt; &lt;symbol&gt; &lt;timeframe&gt;");
    text
}

/// `running` is parallel to `records`.
pub fn my_strategies(records: &[StrategyRecord], running: &[bool]) -> String {
    if records.is_empty() {
        return "You have no strategies. See /strategies".to_string();
    }
    let mut text = String::from("📈 <b>Your strategies</b>\n");
    for (record, running) in records.iter().zip(running) {
        let state = match (*running, record.active) {
            (true, _) => "🟢 running",
            (false, true) => "🟡 starting",
            (false, false) => "⚪ stopped",
        };
        let _ = write!(
            text,
            "\n#{} <b>{}</b> {} {}\n{}",
            record.id,
            escape(&record.strategy_type),
            escape(&record.symbol),
            record.timeframe,
            state
        );
        if let Some(stop) = record.stop_loss_pct {
            let _ = write!(text, " | stop {}%", amount(stop));
        }
        text.push('\n');
    }
    text
}

pub fn portfolio(entries: &[PortfolioEntry], wallets: &[WalletInfo]) -> String {
    if entries.is_empty() {
        return "Your portfolio is empty. Check a balance with /balance to fill it.".to_string();
    }
    let mut text = String::from("💼 <b>Portfolio</b>\n");
    for entry in entries {
        let wallet = wallets
            .iter()
            .find(|w| w.id == entry.wallet_id)
            .map(|w| format!("{} ({})", escape(&w.name), w.chain))
            .unwrap_or_else(|| format!("wallet {}", entry.wallet_id));
        let _ = write!(
            text,
            "\n{} {} in {}",
            amount(entry.amount),
            escape(&entry.symbol),
            wallet
        );
    }
    text
}

pub fn paper_trades(trades: &[PaperTradeRecord]) -> String {
    if trades.is_empty() {
        return "No paper trades yet.".to_string();
    }
    let mut text = String::from("🧾 <b>Paper trades</b>\n");
    for trade in trades {
        let _ = write!(
            text,
            "\n#{} {} {} {} @ {}",
            trade.strategy_id,
            trade.side,
            amount(trade.quantity),
            escape(&trade.symbol),
            amount(trade.price)
        );
        if let Some(pnl) = trade.pnl {
            let _ = write!(text, " | PnL {}", signed(pnl));
        }
        let _ = write!(text, " | {}", time(trade.created_at));
    }
    text
}

fn signed(value: Decimal) -> String {
    let value = value.round_dp(2);
    if value.is_sign_negative() {
        format!("{value:.2}")
    } else {
        format!("+{value:.2}")
    }
}

/// Notification for one engine event.
pub fn event(event: &EngineEvent) -> String {
    let symbol = escape(&event.symbol);
    match &event.kind {
        EventKind::Opened {
            quantity,
            price,
            stop_price,
        } => {
            let mut text = format!(
                "🟢 <b>Strategy #{}</b> bought {} {} @ {}",
                event.job_id,
                amount(*quantity),
                symbol,
                amount(*price)
            );
            if let Some(stop) = stop_price {
                let _ = write!(text, "\nStop: {}", amount(*stop));
            }
            text
        }
        EventKind::Closed {
            quantity,
            price,
            pnl,
            reason,
        } => format!(
            "🔴 <b>Strategy #{}</b> sold {} {} @ {} ({})\nPnL: {}",
            event.job_id,
            amount(*quantity),
            symbol,
            amount(*price),
            reason.as_str().replace('_', " "),
            signed(*pnl)
        ),
        EventKind::Rejected { reason } => format!(
            "⚠️ <b>Strategy #{}</b> skipped a {} signal: {}",
            event.job_id,
            symbol,
            escape(reason)
        ),
        EventKind::Failed { message } => format!(
            "❌ <b>Strategy #{}</b> stopped: {}",
            event.job_id,
            escape(message)
        ),
    }
}

/// One-line reply for a wallet failure.
pub fn wallet_error(err: &WalletError) -> String {
    match err {
        // Storage details are for the log, not the chat.
        WalletError::Store(_) | WalletError::Io(_) | WalletError::Decryption => {
            error("Something went wrong on our side. Please try again later.")
        }
        other => error(other),
    }
}
