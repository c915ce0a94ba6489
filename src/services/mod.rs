// All service modules
pub mod candidate_feed;
pub mod destination_resolver;
pub mod notification_service;
pub mod scan_engine;
pub mod scheduler;
pub mod transaction_validator;

#[cfg(test)]
pub(crate) mod testing;

// Re-export for convenience
pub use candidate_feed::HttpCandidateFeed;
pub use destination_resolver::MoralisResolver;
pub use notification_service::EmailNotifier;
pub use scan_engine::{PassReport, ScanEngine};
pub use scheduler::Scheduler;

use crate::{
    config::Config,
    db::Database,
    indexer::{build_http_client, BitcoinClient, ChainClients, EthereumClient},
};
use std::sync::Arc;

/// Wires the production collaborators around one shared HTTP client.
pub fn build_scan_engine(db: Database, config: &Config) -> ScanEngine {
    let http = build_http_client(config.http_timeout_secs);

    let clients = ChainClients::new()
        .with(Arc::new(BitcoinClient::new(
            http.clone(),
            config.bitcoin_api_url.clone(),
        )))
        .with(Arc::new(EthereumClient::new(
            http.clone(),
            config.ethereum_rpc_url.clone(),
        )));

    ScanEngine::new(
        Arc::new(db),
        clients,
        Arc::new(MoralisResolver::new(http.clone(), config)),
        Arc::new(EmailNotifier::new(http.clone(), config)),
        Arc::new(HttpCandidateFeed::new(http, config.candidate_feed_url.clone())),
    )
}

/// Start all background services
pub async fn start_background_services(scheduler: Arc<Scheduler>, config: Config) {
    if !config.monitor_autostart {
        tracing::info!("Monitor autostart disabled; waiting for POST /api/v1/monitor/start");
        return;
    }

    tracing::info!("Starting background services...");
    if let Err(e) = scheduler.start(config.monitor_interval_minutes).await {
        tracing::error!("Failed to autostart monitor: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn autostart_disabled_leaves_scheduler_idle() {
        let store = Arc::new(testing::MemoryStore::default());
        let scheduler = Arc::new(Scheduler::new(Arc::new(testing::idle_engine(store))));
        start_background_services(scheduler.clone(), crate::config::test_config()).await;
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn autostart_enabled_starts_scheduler() {
        let store = Arc::new(testing::MemoryStore::default());
        let scheduler = Arc::new(Scheduler::new(Arc::new(testing::idle_engine(store))));
        let mut config = crate::config::test_config();
        config.monitor_autostart = true;
        start_background_services(scheduler.clone(), config).await;
        assert!(scheduler.status().await.running);
        scheduler.stop().await;
    }
}
