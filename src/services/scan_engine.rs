use chrono::Utc;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use super::{
    candidate_feed::CandidateSource, destination_resolver::LabelResolver,
    notification_service::Notifier, transaction_validator,
};
use crate::{
    constants::{SCAN_BATCH_SIZE, TOKEN_BTC, TOKEN_ETH, UNKNOWN_DESTINATION},
    db::MonitorStore,
    error::Result,
    indexer::{address_classifier, ChainClients, RawTx},
    models::{Chain, DetectedTransaction, MonitorRunState, WatchedAddress},
};

/// Counters for one monitoring pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub candidates_ingested: usize,
    pub candidates_rejected: usize,
    pub addresses_scanned: usize,
    pub addresses_skipped: usize,
    pub addresses_failed: usize,
    pub transactions_detected: usize,
    pub transactions_duplicate: usize,
    pub transactions_invalid: usize,
    pub notifications_failed: usize,
}

#[derive(Debug, Default)]
struct TxCounts {
    detected: usize,
    duplicate: usize,
    invalid: usize,
    notifications_failed: usize,
}

#[derive(Debug)]
enum AddressOutcome {
    Scanned(TxCounts),
    Skipped,
    Failed(TxCounts),
}

impl PassReport {
    fn record(&mut self, outcome: AddressOutcome) {
        let counts = match outcome {
            AddressOutcome::Scanned(counts) => {
                self.addresses_scanned += 1;
                counts
            }
            AddressOutcome::Skipped => {
                self.addresses_skipped += 1;
                return;
            }
            AddressOutcome::Failed(counts) => {
                self.addresses_failed += 1;
                counts
            }
        };
        self.transactions_detected += counts.detected;
        self.transactions_duplicate += counts.duplicate;
        self.transactions_invalid += counts.invalid;
        self.notifications_failed += counts.notifications_failed;
    }
}

fn token_name(chain: Chain) -> &'static str {
    match chain {
        Chain::Bitcoin => TOKEN_BTC,
        Chain::Ethereum => TOKEN_ETH,
    }
}

/// One monitoring pass: ingest candidates, then scan every watched address
/// for outgoing transactions above its watermark.
pub struct ScanEngine {
    store: Arc<dyn MonitorStore>,
    clients: ChainClients,
    resolver: Arc<dyn LabelResolver>,
    notifier: Arc<dyn Notifier>,
    candidates: Arc<dyn CandidateSource>,
}

impl ScanEngine {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        clients: ChainClients,
        resolver: Arc<dyn LabelResolver>,
        notifier: Arc<dyn Notifier>,
        candidates: Arc<dyn CandidateSource>,
    ) -> Self {
        Self {
            store,
            clients,
            resolver,
            notifier,
            candidates,
        }
    }

    /// Runs a full pass and records its outcome in the persisted run state.
    /// Only a watch-list load failure is a run-level error.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let mut state = self.load_run_state().await;
        self.update_run_state(&mut state, |s| s.mark_running(Utc::now()))
            .await;

        match self.execute_pass().await {
            Ok(report) => {
                self.update_run_state(&mut state, |s| s.mark_completed(Utc::now()))
                    .await;
                tracing::info!(
                    "Monitoring pass complete: {} scanned, {} skipped, {} failed, {} new txs ({} duplicate, {} invalid, {} alerts failed)",
                    report.addresses_scanned,
                    report.addresses_skipped,
                    report.addresses_failed,
                    report.transactions_detected,
                    report.transactions_duplicate,
                    report.transactions_invalid,
                    report.notifications_failed
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Monitoring pass failed: {}", e);
                let message = e.to_string();
                self.update_run_state(&mut state, |s| s.mark_error(message))
                    .await;
                Err(e)
            }
        }
    }

    async fn execute_pass(&self) -> Result<PassReport> {
        let mut report = PassReport::default();
        self.ingest_candidates(&mut report).await;

        let addresses = self.store.list_addresses().await?;
        tracing::debug!("Scanning {} watched addresses", addresses.len());

        let outcomes: Vec<AddressOutcome> = stream::iter(addresses)
            .map(|address| self.scan_address(address))
            .buffer_unordered(SCAN_BATCH_SIZE)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        Ok(report)
    }

    /// Adds feed candidates to the watch-list with watermark 0. Existing rows
    /// are never touched.
    pub async fn ingest_candidates(&self, report: &mut PassReport) {
        for raw in self.candidates.fetch_candidates().await {
            let address = address_classifier::normalize(&raw);
            let chain = match address_classifier::classify(&address) {
                Some(chain) if address_classifier::is_valid_format(&address, chain) => chain,
                _ => {
                    tracing::debug!("Rejecting candidate '{}'", raw.trim());
                    report.candidates_rejected += 1;
                    continue;
                }
            };

            match self
                .store
                .upsert_address(&WatchedAddress::new(address.clone(), chain))
                .await
            {
                Ok(true) => {
                    tracing::info!("Watching new {} address {}", chain, address);
                    report.candidates_ingested += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to store candidate {}: {}", address, e),
            }
        }
    }

    // Internal helper that scans one address and advances its watermark only
    // when every transaction in the window was handled.
    async fn scan_address(&self, address: WatchedAddress) -> AddressOutcome {
        let Some(chain) = Chain::parse(&address.chain) else {
            tracing::warn!(
                "Skipping {}: unsupported chain '{}'",
                address.address,
                address.chain
            );
            return AddressOutcome::Skipped;
        };
        let Some(client) = self.clients.get(chain) else {
            tracing::warn!("Skipping {}: no {} client configured", address.address, chain);
            return AddressOutcome::Skipped;
        };

        let watermark = address.watermark_height();
        let Some(tip) = client.get_tip_height().await else {
            tracing::warn!(
                "Skipping {}: {} tip height unknown, watermark stays at {}",
                address.address,
                chain,
                watermark
            );
            return AddressOutcome::Skipped;
        };

        let raw_txs = client
            .fetch_outgoing_since(&address.address, watermark, tip)
            .await;

        let mut counts = TxCounts::default();
        for raw in raw_txs {
            if raw.block_height <= watermark || raw.block_height > tip {
                tracing::debug!(
                    "Ignoring {} at {} outside ({}, {}]",
                    raw.tx_hash,
                    raw.block_height,
                    watermark,
                    tip
                );
                continue;
            }
            if let Err(e) = self.process_tx(&address, chain, raw, &mut counts).await {
                tracing::warn!(
                    "Scan of {} aborted, watermark stays at {}: {}",
                    address.address,
                    watermark,
                    e
                );
                return AddressOutcome::Failed(counts);
            }
        }

        let next = watermark.max(tip);
        if let Err(e) = self.store.update_watermark(&address.address, next).await {
            tracing::warn!("Failed to advance watermark for {}: {}", address.address, e);
            return AddressOutcome::Failed(counts);
        }
        tracing::debug!("{} watermark {} -> {}", address.address, watermark, next);

        AddressOutcome::Scanned(counts)
    }

    async fn process_tx(
        &self,
        address: &WatchedAddress,
        chain: Chain,
        raw: RawTx,
        counts: &mut TxCounts,
    ) -> Result<()> {
        let tx = self.build_transaction(address, chain, raw).await;

        if !transaction_validator::validate(&tx) {
            counts.invalid += 1;
            return Ok(());
        }
        if self.store.transaction_exists(&tx.tx_hash).await? {
            counts.duplicate += 1;
            return Ok(());
        }
        // Lost a race with another address sharing this tx
        if !self.store.insert_transaction(&tx).await? {
            counts.duplicate += 1;
            return Ok(());
        }
        counts.detected += 1;
        tracing::info!(
            "Outgoing {} {} from {} to {} ({}) at block {}",
            tx.amount.normalize(),
            tx.token_name,
            tx.from_address,
            tx.to_address,
            tx.destination_label,
            tx.block_height
        );

        if let Err(e) = self.notifier.notify(&tx).await {
            tracing::warn!("Alert for {} not delivered: {}", tx.tx_hash, e);
            counts.notifications_failed += 1;
        }
        Ok(())
    }

    // Internal helper that turns a chain record into the stored row shape.
    async fn build_transaction(
        &self,
        address: &WatchedAddress,
        chain: Chain,
        raw: RawTx,
    ) -> DetectedTransaction {
        let destinations = raw.destinations();
        let destination_label = self.resolve_label(&destinations).await;

        DetectedTransaction {
            chain: chain.as_str().to_string(),
            from_address: address.address.clone(),
            to_address: destinations.join(", "),
            amount: raw.total_amount(),
            token_name: token_name(chain).to_string(),
            tx_hash: raw.tx_hash,
            block_height: i64::try_from(raw.block_height).unwrap_or(i64::MAX),
            destination_label,
            timestamp: Utc::now(),
        }
    }

    /// First known label across destinations, in output order.
    async fn resolve_label(&self, destinations: &[String]) -> String {
        for destination in destinations {
            let label = self.resolver.resolve(destination).await;
            if label != UNKNOWN_DESTINATION {
                return label;
            }
        }
        UNKNOWN_DESTINATION.to_string()
    }

    // Internal helper that reads the persisted run state. `None` means the read
    // failed and the stored row must not be overwritten this pass.
    async fn load_run_state(&self) -> Option<MonitorRunState> {
        match self.store.get_run_state().await {
            Ok(state) => Some(state.unwrap_or_default()),
            Err(e) => {
                tracing::warn!("Failed to load monitor state, leaving it untouched: {}", e);
                None
            }
        }
    }

    // Internal helper that applies a transition and persists it when the state
    // was loaded.
    async fn update_run_state(
        &self,
        state: &mut Option<MonitorRunState>,
        transition: impl FnOnce(&mut MonitorRunState),
    ) {
        let Some(state) = state.as_mut() else {
            return;
        };
        transition(state);
        if let Err(e) = self.store.upsert_run_state(state).await {
            tracing::warn!("Failed to persist monitor state: {}", e);
        }
    }
}
