//! Configuration management.
//!
//! Settings come from a TOML file, then `CHAINBOT__SECTION__KEY` environment
//! variables, then a handful of plain variables (`ETHEREUM_RPC`,
//! `DATABASE_PATH`, ...) that deployments commonly set. Secrets are never
//! read from the file.

mod settings;

pub use config::ConfigError;
pub use settings::{
    AppConfig, AppSettings, ChainSettings, DatabaseSettings, LoggingConfig, MarketDataSettings,
    PaperSettings, SchedulerSettings, SecuritySettings, TelegramSettings,
};

use chainbot_core::types::Chain;
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::debug;

/// Plain variables that override a chain's RPC URL.
const RPC_OVERRIDES: [(&str, Chain); 5] = [
    ("ETHEREUM_RPC", Chain::Ethereum),
    ("BASE_RPC", Chain::Base),
    ("BSC_RPC", Chain::Bsc),
    ("POLYGON_RPC", Chain::Polygon),
    ("SOLANA_RPC", Chain::Solana),
];

/// Load `.env` (if any), then configuration from file and environment. A
/// missing file is not an error.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if dotenv::dotenv().is_ok() {
        debug!(".env loaded");
    }

    let config = Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("CHAINBOT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut app: AppConfig = config.try_deserialize()?;
    apply_env_overrides(&mut app, |key| std::env::var(key).ok());
    validate(&app)?;
    Ok(app)
}

/// Apply the plain variable overrides. `lookup` returns a variable's value.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    for (var, chain) in RPC_OVERRIDES {
        if let Some(url) = present(var) {
            *config.chains.rpc_url_mut(chain) = url;
        }
    }
    if let Some(path) = present("DATABASE_PATH") {
        config.database.path = path;
    }
}

/// Reject settings the bot cannot run with.
pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let fail = |msg: String| Err(ConfigError::Message(msg));

    if !matches!(config.logging.format.as_str(), "pretty" | "json") {
        return fail(format!(
            "logging.format must be pretty or json, got {}",
            config.logging.format
        ));
    }
    if config.telegram.token_env.trim().is_empty() {
        return fail("telegram.token_env must name an environment variable".into());
    }
    if config.database.path.trim().is_empty() {
        return fail("database.path must not be empty".into());
    }
    if config.paper.initial_capital <= Decimal::ZERO {
        return fail("paper.initial_capital must be positive".into());
    }
    if config.paper.slippage_pct < Decimal::ZERO || config.paper.fee_pct < Decimal::ZERO {
        return fail("paper.slippage_pct and paper.fee_pct must not be negative".into());
    }
    if config.scheduler.max_jobs_per_user == 0 {
        return fail("scheduler.max_jobs_per_user must be at least 1".into());
    }
    if config.chains.endpoints().is_empty() {
        return fail("at least one chain RPC URL must be configured".into());
    }
    Ok(())
}

/// Defaults rendered as TOML, for `init-config`.
pub fn default_toml() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&AppConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "chainbot");
        assert_eq!(config.database.path, "wallets.db");
        assert_eq!(config.telegram.token_env, "TELEGRAM_TOKEN");
        assert_eq!(config.paper.initial_capital, dec!(10000));
        assert_eq!(config.scheduler.history_bars, 300);
        assert_eq!(config.chains.endpoints().len(), 5);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_plain_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BASE_RPC", "https://base.example"),
            ("SOLANA_RPC", "  "),
            ("DATABASE_PATH", "/data/bot.db"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.chains.base_rpc, "https://base.example");
        assert_eq!(config.chains.solana_rpc, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.database.path, "/data/bot.db");
    }

    #[test]
    fn test_default_toml_roundtrip() {
        let text = default_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.telegram.api_url, "https://api.telegram.org");
        assert_eq!(parsed.paper.fee_pct, dec!(0.1));
    }

    #[test]
    fn test_shipped_config_file() {
        let text = include_str!("../../../config/default.toml");
        let parsed: AppConfig = toml::from_str(text).unwrap();
        assert!(validate(&parsed).is_ok());
        assert_eq!(parsed.database.path, "wallets.db");
        assert_eq!(parsed.scheduler.max_jobs_per_user, 5);
    }

    #[test]
    fn test_partial_file() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [paper]
            initial_capital = 5000

            [chains]
            polygon_rpc = ""
            "#,
        )
        .unwrap();
        assert_eq!(parsed.paper.initial_capital, dec!(5000));
        assert_eq!(parsed.paper.fee_pct, dec!(0.1));
        assert_eq!(parsed.chains.endpoints().len(), 4);
        assert_eq!(parsed.chains.ethereum_rpc, "https://eth.llamarpc.com");
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.logging.format = "xml".into();
        assert!(validate(&config).is_err());

        let mut config = AppConfig::default();
        config.paper.initial_capital = Decimal::ZERO;
        assert!(validate(&config).is_err());

        let mut config = AppConfig::default();
        for (_, chain) in RPC_OVERRIDES {
            config.chains.rpc_url_mut(chain).clear();
        }
        assert!(validate(&config).is_err());
    }
}
