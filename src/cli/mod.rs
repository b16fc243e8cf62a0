//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainbot")]
#[command(author, version, about = "Multi-chain Telegram wallet and strategy bot")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level (overrides logging.level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Telegram bot and the strategy scheduler
    Run,
    /// Run one strategy on live candles against a paper account
    Paper(PaperArgs),
    /// Replay a strategy over historical candles
    Backtest(BacktestArgs),
    /// Look up a native or token balance
    Balance(BalanceArgs),
    /// Show the status of a transaction
    TxStatus(TxStatusArgs),
    /// List available strategies
    Strategies,
    /// Print a fresh encryption key for ENCRYPTION_KEY
    Keygen,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate configuration
    ValidateConfig,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Strategy to run
    #[arg(short, long)]
    pub strategy: String,

    /// Base asset, e.g. ETH
    #[arg(short = 'S', long, default_value = "ETH")]
    pub symbol: String,

    /// Candle timeframe
    #[arg(short, long, default_value = "1h")]
    pub timeframe: String,

    /// Strategy parameters as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    /// Fixed stop-loss in percent
    #[arg(long)]
    pub stop_loss: Option<Decimal>,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Strategy to backtest
    #[arg(short, long)]
    pub strategy: String,

    /// Data file (CSV)
    #[arg(long)]
    pub data: PathBuf,

    /// Symbol the data belongs to
    #[arg(short = 'S', long, default_value = "ETH")]
    pub symbol: String,

    /// Timeframe of the data
    #[arg(short, long, default_value = "1h")]
    pub timeframe: String,

    /// Initial capital (defaults to paper.initial_capital)
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Strategy parameters as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    /// Fixed stop-loss in percent
    #[arg(long)]
    pub stop_loss: Option<Decimal>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Save results to file (.csv writes the equity curve, anything else JSON)
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct BalanceArgs {
    /// Chain name (ethereum, base, bsc, polygon, solana)
    #[arg(long)]
    pub chain: String,

    /// Wallet address
    #[arg(long)]
    pub address: String,

    /// ERC-20 token contract address
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(clap::Args)]
pub struct TxStatusArgs {
    /// Chain name
    #[arg(long)]
    pub chain: String,

    /// Transaction hash or signature
    #[arg(long)]
    pub hash: String,
}
