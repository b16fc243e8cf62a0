//! chainbot CLI application.

mod cli;

use anyhow::{Context, Result};
use chainbot_config::{load_config, AppConfig, ConfigError, LoggingConfig};
use chainbot_monitor::setup_logging;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config);
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or(logging.level);
    let json = cli.json_logs || logging.format == "json";
    let _guard = setup_logging(&level, json, logging.file.as_deref().map(Path::new));

    match cli.command {
        Commands::Strategies => cli::commands::strategies::run(),
        Commands::Keygen => cli::commands::keygen::run(),
        Commands::InitConfig { force } => cli::commands::config::init(&cli.config, force),
        Commands::ValidateConfig => cli::commands::config::validate(&cli.config, loaded),
        Commands::Run => cli::commands::run::run(require(loaded, &cli.config)?).await,
        Commands::Paper(args) => {
            cli::commands::paper::run(args, require(loaded, &cli.config)?).await
        }
        Commands::Backtest(args) => {
            cli::commands::backtest::run(args, require(loaded, &cli.config)?).await
        }
        Commands::Balance(args) => {
            cli::commands::chain::balance(args, require(loaded, &cli.config)?).await
        }
        Commands::TxStatus(args) => {
            cli::commands::chain::tx_status(args, require(loaded, &cli.config)?).await
        }
    }
}

fn require(loaded: Result<AppConfig, ConfigError>, path: &Path) -> Result<AppConfig> {
    loaded.with_context(|| format!("Invalid configuration in {}", path.display()))
}
