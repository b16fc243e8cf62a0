//! Configuration file commands.

use anyhow::{Context, Result};
use chainbot_config::{default_toml, AppConfig, ConfigError};
use std::path::Path;

pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, default_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn validate(path: &Path, loaded: Result<AppConfig, ConfigError>) -> Result<()> {
    println!("Validating configuration: {:?}", path);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Database: {}", config.database.path);
    for (chain, url) in config.chains.endpoints() {
        println!("Chain {chain}: {url}");
    }
    println!(
        "Telegram token ({}): {}",
        config.telegram.token_env,
        if config.telegram.token().is_some() { "set" } else { "missing" }
    );
    println!(
        "Encryption key ({}): {}",
        config.security.encryption_key_env,
        if config.security.encryption_key().is_some() {
            "set".to_string()
        } else {
            format!("from {}", config.security.key_file)
        }
    );
    println!("Paper capital: {}", config.paper.initial_capital);
    println!("Max strategies per user: {}", config.scheduler.max_jobs_per_user);

    Ok(())
}
