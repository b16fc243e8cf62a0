//! CLI command implementations.

pub mod backtest;
pub mod chain;
pub mod config;
pub mod keygen;
pub mod paper;
pub mod run;
pub mod strategies;

use anyhow::{Context, Result};
use chainbot_broker::PaperConfig;
use chainbot_chain::ClientOptions;
use chainbot_config::AppConfig;
use chainbot_core::types::{Chain, Timeframe};
use chainbot_data::BinanceConfig;
use chainbot_engine::SchedulerConfig;

pub(crate) fn paper_config(config: &AppConfig) -> PaperConfig {
    PaperConfig {
        initial_capital: config.paper.initial_capital,
        slippage_pct: config.paper.slippage_pct,
        fee_pct: config.paper.fee_pct,
        ..PaperConfig::default()
    }
}

pub(crate) fn scheduler_config(config: &AppConfig) -> SchedulerConfig {
    SchedulerConfig {
        max_jobs_per_user: config.scheduler.max_jobs_per_user,
        history_bars: config.scheduler.history_bars,
        risk: config.risk.clone(),
        paper: paper_config(config),
        ..SchedulerConfig::default()
    }
}

pub(crate) fn binance_config(config: &AppConfig) -> BinanceConfig {
    BinanceConfig {
        base_url: config.market_data.base_url.clone(),
        quote_asset: config.market_data.quote_asset.clone(),
        cache_ttl_secs: config.market_data.cache_ttl_secs,
        request_timeout_secs: config.chains.request_timeout_secs,
    }
}

pub(crate) fn client_options(config: &AppConfig) -> ClientOptions {
    ClientOptions {
        request_timeout: config.chains.request_timeout(),
        confirmation_timeout: config.chains.confirmation_timeout(),
    }
}

pub(crate) fn parse_chain(raw: &str) -> Result<Chain> {
    raw.parse::<Chain>().map_err(anyhow::Error::msg)
}

pub(crate) fn parse_timeframe(raw: &str) -> Result<Timeframe> {
    raw.parse::<Timeframe>().map_err(anyhow::Error::msg)
}

/// `--params` as a JSON object; `Null` when absent.
pub(crate) fn parse_params(raw: Option<&str>) -> Result<serde_json::Value> {
    let Some(raw) = raw else {
        return Ok(serde_json::Value::Null);
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--params must be valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--params must be a JSON object");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_subsystem_configs_follow_app_config() {
        let mut config = AppConfig::default();
        config.paper.initial_capital = dec!(2500);
        config.scheduler.max_jobs_per_user = 2;
        config.chains.request_timeout_secs = 3;

        let scheduler = scheduler_config(&config);
        assert_eq!(scheduler.max_jobs_per_user, 2);
        assert_eq!(scheduler.paper.initial_capital, dec!(2500));
        assert_eq!(binance_config(&config).request_timeout_secs, 3);
        assert_eq!(client_options(&config).request_timeout.as_secs(), 3);
    }

    #[test]
    fn test_parse_params() {
        assert!(parse_params(None).unwrap().is_null());
        assert_eq!(parse_params(Some(r#"{"period": 9}"#)).unwrap()["period"], 9);
        assert!(parse_params(Some("[1]")).is_err());
        assert!(parse_params(Some("{oops")).is_err());
    }
}
