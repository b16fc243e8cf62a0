//! Symmetric encryption of private keys at rest.

use crate::error::{WalletError, WalletResult};
use fernet::Fernet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Fernet cipher holding the bot's encryption key.
pub struct KeyVault {
    fernet: Fernet,
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyVault(<redacted>)")
    }
}

impl KeyVault {
    /// A fresh url-safe base64 Fernet key.
    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    pub fn from_key(key: &str) -> WalletResult<Self> {
        Fernet::new(key.trim())
            .map(|fernet| Self { fernet })
            .ok_or_else(|| WalletError::InvalidKey("expected 32 url-safe base64 bytes".into()))
    }

    /// Resolve the key in order: the `env_key` value, the contents of
    /// `key_file`, or a newly generated key written to `key_file`.
    pub fn load(env_key: Option<&str>, key_file: &Path) -> WalletResult<Self> {
        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            info!("encryption key loaded from environment");
            return Self::from_key(key);
        }

        if key_file.exists() {
            let key = fs::read_to_string(key_file)?;
            info!(path = %key_file.display(), "encryption key loaded from file");
            return Self::from_key(&key);
        }

        let key = Self::generate_key();
        write_private(key_file, key.as_bytes())?;
        warn!(
            path = %key_file.display(),
            "generated a new encryption key; back it up, stored wallets cannot be decrypted without it"
        );
        Self::from_key(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt(&self, token: &str) -> WalletResult<String> {
        let bytes = self
            .fernet
            .decrypt(token)
            .map_err(|_| WalletError::Decryption)?;
        String::from_utf8(bytes).map_err(|_| WalletError::Decryption)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_key_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chainbot-{tag}-{}.key", std::process::id()))
    }

    #[test]
    fn test_encrypt_roundtrip() {
        let vault = KeyVault::from_key(&KeyVault::generate_key()).unwrap();
        let token = vault.encrypt("secret");
        assert_ne!(token, "secret");
        assert_eq!(vault.decrypt(&token).unwrap(), "secret");
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let a = KeyVault::from_key(&KeyVault::generate_key()).unwrap();
        let b = KeyVault::from_key(&KeyVault::generate_key()).unwrap();
        let token = a.encrypt("secret");
        assert!(matches!(b.decrypt(&token), Err(WalletError::Decryption)));
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            KeyVault::from_key("not-a-key"),
            Err(WalletError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_load_generates_then_reuses_file() {
        let path = temp_key_path("vault");
        let _ = fs::remove_file(&path);

        let first = KeyVault::load(None, &path).unwrap();
        assert!(path.exists());
        let token = first.encrypt("secret");

        let second = KeyVault::load(Some("  "), &path).unwrap();
        assert_eq!(second.decrypt(&token).unwrap(), "secret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_env_key_wins() {
        let path = temp_key_path("unused");
        let key = KeyVault::generate_key();
        let vault = KeyVault::load(Some(&key), &path).unwrap();
        assert!(!path.exists());
        let token = KeyVault::from_key(&key).unwrap().encrypt("x");
        assert_eq!(vault.decrypt(&token).unwrap(), "x");
    }
}
