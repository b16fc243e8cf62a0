//! Configuration structures.

use chainbot_core::types::Chain;
use chainbot_risk::RiskConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub chains: ChainSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub market_data: MarketDataSettings,
    #[serde(default)]
    pub paper: PaperSettings,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "chainbot".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
    /// Directory for daily rolling log files.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Name of the variable holding the bot token.
    pub token_env: String,
    pub api_url: String,
    pub poll_timeout_secs: u64,
    pub welcome_message: String,
    /// Rows shown by `/history` and `/trades`.
    pub history_limit: u32,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token_env: "TELEGRAM_TOKEN".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            welcome_message: "Hello! Your bot is running on Render.".to_string(),
            history_limit: 10,
        }
    }
}

impl TelegramSettings {
    pub fn token(&self) -> Option<String> {
        read_secret(&self.token_env)
    }
}

/// RPC endpoints. An empty URL disables the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub ethereum_rpc: String,
    pub base_rpc: String,
    pub bsc_rpc: String,
    pub polygon_rpc: String,
    pub solana_rpc: String,
    pub confirmation_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            ethereum_rpc: "https://eth.llamarpc.com".to_string(),
            base_rpc: "https://mainnet.base.org".to_string(),
            bsc_rpc: "https://bsc-dataseed1.binance.org".to_string(),
            polygon_rpc: "https://polygon-rpc.com".to_string(),
            solana_rpc: "https://api.mainnet-beta.solana.com".to_string(),
            confirmation_timeout_secs: 120,
            request_timeout_secs: 10,
        }
    }
}

impl ChainSettings {
    pub fn rpc_url(&self, chain: Chain) -> &str {
        match chain {
            Chain::Ethereum => &self.ethereum_rpc,
            Chain::Base => &self.base_rpc,
            Chain::Bsc => &self.bsc_rpc,
            Chain::Polygon => &self.polygon_rpc,
            Chain::Solana => &self.solana_rpc,
        }
    }

    pub(crate) fn rpc_url_mut(&mut self, chain: Chain) -> &mut String {
        match chain {
            Chain::Ethereum => &mut self.ethereum_rpc,
            Chain::Base => &mut self.base_rpc,
            Chain::Bsc => &mut self.bsc_rpc,
            Chain::Polygon => &mut self.polygon_rpc,
            Chain::Solana => &mut self.solana_rpc,
        }
    }

    /// Configured `(chain, url)` pairs, skipping disabled chains.
    pub fn endpoints(&self) -> Vec<(Chain, String)> {
        Chain::ALL
            .iter()
            .map(|&c| (c, self.rpc_url(c).trim().to_string()))
            .filter(|(_, url)| !url.is_empty())
            .collect()
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "wallets.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Name of the variable holding the Fernet key.
    pub encryption_key_env: String,
    /// Fallback location of the key, created on first run.
    pub key_file: String,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            encryption_key_env: "ENCRYPTION_KEY".to_string(),
            key_file: "encryption.key".to_string(),
        }
    }
}

impl SecuritySettings {
    pub fn encryption_key(&self) -> Option<String> {
        read_secret(&self.encryption_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    pub base_url: String,
    pub quote_asset: String,
    pub cache_ttl_secs: u64,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            quote_asset: "USDT".to_string(),
            cache_ttl_secs: 30,
        }
    }
}

/// Paper account used by every strategy job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_capital: Decimal,
    pub slippage_pct: Decimal,
    pub fee_pct: Decimal,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            slippage_pct: dec!(0.05),
            fee_pct: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub max_jobs_per_user: usize,
    /// Candles used to warm a strategy up before it trades.
    pub history_bars: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_jobs_per_user: 5,
            history_bars: 300,
        }
    }
}

fn read_secret(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
