//! List strategies command.

use anyhow::Result;
use chainbot_strategies::StrategyRegistry;

pub fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    for info in registry.list() {
        println!("{:<14} {}", info.key, info.name);
        println!("{:<14} {}", "", info.description);
        println!("{:<14} defaults {}\n", "", info.default_config);
    }

    println!("CLI:      chainbot paper --strategy <key> --symbol ETH --timeframe 1h");
    println!("Telegram: /addstrategy <key> <symbol> <timeframe> [json]");
    Ok(())
}
