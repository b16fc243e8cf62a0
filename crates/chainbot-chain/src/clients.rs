//! One client per configured chain.

use crate::evm::EvmClient;
use crate::solana::SolanaClient;
use chainbot_core::error::ChainError;
use chainbot_core::traits::ChainClient;
use chainbot_core::types::Chain;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    /// HTTP timeout for plain JSON-RPC calls.
    pub request_timeout: Duration,
    /// How long a send waits for its receipt.
    pub confirmation_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(120),
        }
    }
}

/// Chain clients keyed by chain.
///
/// Reads go through [`ChainClients::get`]; transfers and token calls need the
/// concrete EVM client from [`ChainClients::evm`].
#[derive(Default, Clone)]
pub struct ChainClients {
    readers: BTreeMap<Chain, Arc<dyn ChainClient>>,
    evm: BTreeMap<Chain, Arc<EvmClient>>,
}

impl ChainClients {
    /// Build clients for every `(chain, rpc_url)` pair. Empty URLs are skipped.
    pub fn connect<I, S>(endpoints: I, options: ClientOptions) -> Result<Self, ChainError>
    where
        I: IntoIterator<Item = (Chain, S)>,
        S: AsRef<str>,
    {
        let mut clients = Self::default();
        for (chain, url) in endpoints {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            if chain.is_evm() {
                let client = Arc::new(EvmClient::new(chain, url, options.confirmation_timeout)?);
                clients.readers.insert(chain, client.clone());
                clients.evm.insert(chain, client);
            } else {
                let client = Arc::new(SolanaClient::new(url, options.request_timeout)?);
                clients.readers.insert(chain, client);
            }
            info!(chain = %chain, "chain client ready");
        }
        Ok(clients)
    }

    /// Register a read-only client, replacing any reader for its chain.
    pub fn register(&mut self, client: Arc<dyn ChainClient>) {
        self.readers.insert(client.chain(), client);
    }

    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainClient>, ChainError> {
        self.readers
            .get(&chain)
            .cloned()
            .ok_or_else(|| ChainError::UnsupportedChain(chain.to_string()))
    }

    /// The EVM client for `chain`. Transfers and token reads need one.
    pub fn evm(&self, chain: Chain) -> Result<Arc<EvmClient>, ChainError> {
        if !chain.is_evm() {
            return Err(ChainError::Unsupported(format!("{chain} is not an EVM chain")));
        }
        self.evm
            .get(&chain)
            .cloned()
            .ok_or_else(|| ChainError::UnsupportedChain(chain.to_string()))
    }

    /// Chains with a reader, in declaration order.
    pub fn chains(&self) -> Vec<Chain> {
        self.readers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clients() -> ChainClients {
        ChainClients::connect(
            [
                (Chain::Ethereum, "http://127.0.0.1:8545"),
                (Chain::Polygon, ""),
                (Chain::Solana, "http://127.0.0.1:8899"),
            ],
            ClientOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_connect_skips_empty_urls() {
        let clients = clients();
        assert_eq!(clients.chains(), vec![Chain::Ethereum, Chain::Solana]);
        assert!(matches!(
            clients.get(Chain::Polygon),
            Err(ChainError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_lookup() {
        let clients = clients();
        assert_eq!(clients.get(Chain::Ethereum).unwrap().chain(), Chain::Ethereum);
        assert_eq!(clients.get(Chain::Solana).unwrap().chain(), Chain::Solana);
        assert!(clients.evm(Chain::Ethereum).is_ok());
    }

    #[test]
    fn test_solana_is_not_evm() {
        assert!(matches!(
            clients().evm(Chain::Solana),
            Err(ChainError::Unsupported(_))
        ));
    }
}
