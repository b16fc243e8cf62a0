//! Encryption key generation.

use anyhow::Result;
use chainbot_wallet::KeyVault;

pub fn run() -> Result<()> {
    println!("{}", KeyVault::generate_key());
    eprintln!("Store this value in ENCRYPTION_KEY. Losing it makes stored wallets unreadable.");
    Ok(())
}
