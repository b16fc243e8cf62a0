//! Lookup and construction of strategies by their short name.

use crate::{
    EmaBreakoutConfig, EmaBreakoutStrategy, EmaCrossoverConfig, EmaCrossoverStrategy,
    LowRsiConfig, LowRsiStrategy,
};
use chainbot_core::{error::StrategyError, traits::Strategy, traits::StrategyConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Short name used in commands and the database (`ema_crossover`).
    pub key: String,
    /// Display name.
    pub name: String,
    pub description: String,
    /// Default parameters as JSON, without the symbol list.
    pub default_config: serde_json::Value,
}

/// Catalogue of the built-in strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

fn defaults<T: Serialize>(config: T) -> serde_json::Value {
    let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.remove("symbols");
    }
    value
}

fn parse<T>(params: serde_json::Value, symbols: Vec<String>) -> Result<T, StrategyError>
where
    T: DeserializeOwned + StrategyConfig + HasSymbols,
{
    let params = if params.is_null() {
        serde_json::json!({})
    } else {
        params
    };
    let mut config: T = serde_json::from_value(params)
        .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
    config.set_symbols(symbols);
    config.validate()?;
    Ok(config)
}

trait HasSymbols {
    fn set_symbols(&mut self, symbols: Vec<String>);
}

macro_rules! impl_has_symbols {
    ($($t:ty),*) => {
        $(impl HasSymbols for $t {
            fn set_symbols(&mut self, symbols: Vec<String>) {
                self.symbols = symbols;
            }
        })*
    };
}

impl_has_symbols!(EmaCrossoverConfig, LowRsiConfig, EmaBreakoutConfig);

impl StrategyRegistry {
    pub fn new() -> Self {
        let mut strategies = BTreeMap::new();
        let mut add = |key: &str, name: &str, description: &str, default_config| {
            strategies.insert(
                key.to_string(),
                StrategyInfo {
                    key: key.to_string(),
                    name: name.to_string(),
                    description: description.to_string(),
                    default_config,
                },
            );
        };

        add(
            "ema_crossover",
            "7 EMA Crossover",
            "Buy when price crosses above the 7 EMA, sell when it closes below",
            defaults(EmaCrossoverConfig::default()),
        );
        add(
            "low_rsi",
            "Low RSI",
            "Buy when RSI drops to 30 or lower, sell when it recovers to 70",
            defaults(LowRsiConfig::default()),
        );
        add(
            "ema_breakout",
            "200 EMA Breakout",
            "Buy when the close breaks above the 200 EMA, sell when it falls back below",
            defaults(EmaBreakoutConfig::default()),
        );

        Self { strategies }
    }

    /// All strategies, ordered by key.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    pub fn get(&self, key: &str) -> Option<&StrategyInfo> {
        self.strategies.get(key)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Build a strategy; missing parameters take their defaults.
    pub fn create(
        &self,
        key: &str,
        params: serde_json::Value,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        match key {
            "ema_crossover" => Ok(Box::new(EmaCrossoverStrategy::new(parse(params, symbols)?))),
            "low_rsi" => Ok(Box::new(LowRsiStrategy::new(parse(params, symbols)?))),
            "ema_breakout" => Ok(Box::new(EmaBreakoutStrategy::new(parse(params, symbols)?))),
            _ => Err(StrategyError::NotFound(key.to_string())),
        }
    }

    pub fn create_default(
        &self,
        key: &str,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let info = self
            .get(key)
            .ok_or_else(|| StrategyError::NotFound(key.to_string()))?;
        self.create(key, info.default_config.clone(), symbols)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        assert_eq!(
            registry.names(),
            vec!["ema_breakout", "ema_crossover", "low_rsi"]
        );
        assert!(registry
            .list()
            .iter()
            .all(|info| info.default_config.get("symbols").is_none()));
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        let strategy = registry
            .create_default("ema_crossover", vec!["ETH".to_string()])
            .unwrap();
        assert_eq!(strategy.name(), "7 EMA Crossover");
        assert_eq!(strategy.symbols(), &["ETH".to_string()]);
        assert_eq!(strategy.warmup_period(), 8);
    }

    #[test]
    fn test_partial_params_use_defaults() {
        let registry = StrategyRegistry::new();
        let strategy = registry
            .create("low_rsi", serde_json::json!({ "entry_below": 25 }), vec!["SOL".into()])
            .unwrap();
        assert_eq!(strategy.state().custom["entry_below"], 25.0);
        assert_eq!(strategy.state().custom["exit_above"], 70.0);

        let strategy = registry
            .create("ema_breakout", serde_json::Value::Null, vec!["BTC".into()])
            .unwrap();
        assert_eq!(strategy.warmup_period(), 201);
    }

    #[test]
    fn test_invalid_params() {
        let registry = StrategyRegistry::new();
        let err = registry
            .create("low_rsi", serde_json::json!({ "period": "fast" }), vec!["ETH".into()])
            .err()
            .unwrap();
        assert!(matches!(err, StrategyError::InvalidConfig(_)));

        let err = registry
            .create("ema_crossover", serde_json::json!({}), vec![])
            .err()
            .unwrap();
        assert!(matches!(err, StrategyError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create_default("grid", vec!["ETH".into()]),
            Err(StrategyError::NotFound(_))
        ));
    }
}
