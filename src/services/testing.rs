//! In-memory stand-ins for the engine's collaborators.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, sync::Mutex};

use super::{
    candidate_feed::CandidateSource, destination_resolver::LabelResolver,
    notification_service::Notifier, scan_engine::ScanEngine,
};
use crate::{
    constants::UNKNOWN_DESTINATION,
    db::MonitorStore,
    error::{AppError, Result},
    indexer::{ChainClient, ChainClients, RawTx},
    models::{Chain, DetectedTransaction, MonitorRunState, RunStatus, WatchedAddress},
};

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub addresses: Mutex<HashMap<String, WatchedAddress>>,
    pub transactions: Mutex<Vec<DetectedTransaction>>,
    pub run_state: Mutex<Option<MonitorRunState>>,
    pub fail_list: bool,
    pub fail_run_state_read: bool,
    pub fail_insert_from: Option<String>,
}

impl MemoryStore {
    pub fn with_address(self, address: &str, chain: &str, watermark: i64) -> Self {
        self.addresses.lock().unwrap().insert(
            address.to_string(),
            WatchedAddress {
                address: address.to_string(),
                chain: chain.to_string(),
                watermark,
            },
        );
        self
    }

    pub fn watermark(&self, address: &str) -> i64 {
        self.addresses.lock().unwrap()[address].watermark
    }

    pub fn stored(&self) -> Vec<DetectedTransaction> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn status(&self) -> RunStatus {
        self.run_state.lock().unwrap().clone().unwrap_or_default().status
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn list_addresses(&self) -> Result<Vec<WatchedAddress>> {
        if self.fail_list {
            return Err(AppError::Internal("store offline".to_string()));
        }
        Ok(self.addresses.lock().unwrap().values().cloned().collect())
    }

    async fn upsert_address(&self, address: &WatchedAddress) -> Result<bool> {
        let mut addresses = self.addresses.lock().unwrap();
        if addresses.contains_key(&address.address) {
            return Ok(false);
        }
        addresses.insert(address.address.clone(), address.clone());
        Ok(true)
    }

    async fn update_watermark(&self, address: &str, height: u64) -> Result<()> {
        let mut addresses = self.addresses.lock().unwrap();
        if let Some(row) = addresses.get_mut(address) {
            row.watermark = row.watermark.max(height as i64);
        }
        Ok(())
    }

    async fn transaction_exists(&self, tx_hash: &str) -> Result<bool> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .any(|t| t.tx_hash == tx_hash))
    }

    async fn insert_transaction(&self, tx: &DetectedTransaction) -> Result<bool> {
        if self.fail_insert_from.as_deref() == Some(tx.from_address.as_str()) {
            return Err(AppError::Internal("insert failed".to_string()));
        }
        let mut transactions = self.transactions.lock().unwrap();
        if transactions.iter().any(|t| t.tx_hash == tx.tx_hash) {
            return Ok(false);
        }
        transactions.push(tx.clone());
        Ok(true)
    }

    async fn recent_transactions(&self, limit: i64) -> Result<Vec<DetectedTransaction>> {
        let mut txs = self.stored();
        txs.sort_by(|a, b| b.block_height.cmp(&a.block_height));
        txs.truncate(limit as usize);
        Ok(txs)
    }

    async fn get_run_state(&self) -> Result<Option<MonitorRunState>> {
        if self.fail_run_state_read {
            return Err(AppError::Internal("state read failed".to_string()));
        }
        Ok(self.run_state.lock().unwrap().clone())
    }

    async fn upsert_run_state(&self, state: &MonitorRunState) -> Result<()> {
        *self.run_state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}

pub(crate) struct FakeChain {
    pub chain: Chain,
    pub tip: Option<u64>,
    pub txs: HashMap<String, Vec<RawTx>>,
    pub fetches: Mutex<Vec<(String, u64, u64)>>,
}

impl FakeChain {
    pub fn new(chain: Chain, tip: Option<u64>) -> Self {
        Self {
            chain,
            tip,
            txs: HashMap::new(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tx(mut self, from: &str, tx: RawTx) -> Self {
        self.txs.entry(from.to_string()).or_default().push(tx);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn get_tip_height(&self) -> Option<u64> {
        self.tip
    }

    async fn fetch_outgoing_since(&self, address: &str, watermark: u64, tip: u64) -> Vec<RawTx> {
        self.fetches
            .lock()
            .unwrap()
            .push((address.to_string(), watermark, tip));
        self.txs
            .get(address)
            .map(|txs| {
                txs.iter()
                    .filter(|tx| tx.block_height > watermark && tx.block_height <= tip)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub(crate) struct FakeResolver {
    pub labels: HashMap<String, String>,
    pub calls: Mutex<usize>,
}

#[async_trait]
impl LabelResolver for FakeResolver {
    async fn resolve(&self, address: &str) -> String {
        *self.calls.lock().unwrap() += 1;
        self.labels
            .get(address)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string())
    }
}

#[derive(Default)]
pub(crate) struct FakeNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, tx: &DetectedTransaction) -> Result<()> {
        if self.fail {
            return Err(AppError::ExternalAPI("mail provider down".to_string()));
        }
        self.sent.lock().unwrap().push(tx.tx_hash.clone());
        Ok(())
    }
}

pub(crate) struct FakeFeed(pub Vec<String>);

#[async_trait]
impl CandidateSource for FakeFeed {
    async fn fetch_candidates(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Engine over an in-memory store with no chain clients and an empty feed.
pub(crate) fn idle_engine(store: Arc<MemoryStore>) -> ScanEngine {
    ScanEngine::new(
        store,
        ChainClients::new(),
        Arc::new(FakeResolver::default()),
        Arc::new(FakeNotifier::default()),
        Arc::new(FakeFeed(Vec::new())),
    )
}
