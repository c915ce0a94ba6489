pub mod address_classifier;
pub mod bitcoin_client;
pub mod ethereum_client;

pub use bitcoin_client::BitcoinClient;
pub use ethereum_client::EthereumClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::models::Chain;

/// One recipient of an outgoing transaction, in the chain's native units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub address: Option<String>,
    pub amount: Decimal,
}

/// Outgoing transaction as reported by a chain client. Unspent-output chains
/// carry every output; account chains carry exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTx {
    pub tx_hash: String,
    pub block_height: u64,
    pub outputs: Vec<RawOutput>,
}

impl RawTx {
    pub fn total_amount(&self) -> Decimal {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Recipient addresses in output order, skipping outputs without one.
    pub fn destinations(&self) -> Vec<String> {
        self.outputs
            .iter()
            .filter_map(|o| o.address.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Per-chain explorer client. Implementations never return errors: failures
/// are logged and collapse to `None` / an empty list.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> Chain;

    async fn get_tip_height(&self) -> Option<u64>;

    /// Outgoing transactions of `address` with `watermark < height <= tip`.
    async fn fetch_outgoing_since(&self, address: &str, watermark: u64, tip: u64) -> Vec<RawTx>;
}

/// Chain clients keyed by chain.
#[derive(Clone, Default)]
pub struct ChainClients {
    clients: HashMap<Chain, Arc<dyn ChainClient>>,
}

impl ChainClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.clients.insert(client.chain(), client);
        self
    }

    pub fn get(&self, chain: Chain) -> Option<Arc<dyn ChainClient>> {
        self.clients.get(&chain).cloned()
    }
}

/// Shared reqwest client with a per-request timeout.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout ({}); using defaults", e);
            reqwest::Client::new()
        })
}
