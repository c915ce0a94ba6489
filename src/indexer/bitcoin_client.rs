use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ChainClient, RawOutput, RawTx};
use crate::{
    constants::{BITCOIN_MAX_TXS_PER_FETCH, SATS_SCALE},
    error::{AppError, Result},
    models::Chain,
};

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    status: EsploraTxStatus,
    #[serde(default)]
    vin: Vec<EsploraVin>,
    #[serde(default)]
    vout: Vec<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraTxStatus {
    confirmed: bool,
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    prevout: Option<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    #[serde(default)]
    value: u64,
    scriptpubkey_address: Option<String>,
}

fn sats_to_btc(sats: u64) -> Decimal {
    Decimal::from(sats) / Decimal::from(10_u64.pow(SATS_SCALE))
}

// Internal helper that checks whether any input spends from `address`.
fn spends_from(tx: &EsploraTx, address: &str) -> bool {
    tx.vin
        .iter()
        .filter_map(|vin| vin.prevout.as_ref())
        .filter_map(|prevout| prevout.scriptpubkey_address.as_deref())
        .any(|a| a.eq_ignore_ascii_case(address))
}

/// Keeps confirmed spends of `address` in `(watermark, tip]`, examining at most
/// `BITCOIN_MAX_TXS_PER_FETCH` records.
fn select_outgoing(txs: Vec<EsploraTx>, address: &str, watermark: u64, tip: u64) -> Vec<RawTx> {
    txs.into_iter()
        .take(BITCOIN_MAX_TXS_PER_FETCH)
        .filter(|tx| tx.status.confirmed)
        .filter_map(|tx| {
            let height = tx.status.block_height?;
            if height <= watermark || height > tip || !spends_from(&tx, address) {
                return None;
            }
            Some(RawTx {
                tx_hash: tx.txid,
                block_height: height,
                outputs: tx
                    .vout
                    .into_iter()
                    .map(|vout| RawOutput {
                        address: vout.scriptpubkey_address,
                        amount: sats_to_btc(vout.value),
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Esplora-compatible REST client (mempool.space, Blockstream, GetBlock).
pub struct BitcoinClient {
    client: Client,
    base_url: String,
}

impl BitcoinClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_tip_height(&self) -> Result<u64> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let body = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .text()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;

        body.trim()
            .parse::<u64>()
            .map_err(|e| AppError::BlockchainRPC(format!("Invalid tip height '{}': {}", body.trim(), e)))
    }

    // Internal helper that fetches the newest page of address history.
    async fn fetch_address_txs(&self, address: &str) -> Result<Vec<EsploraTx>> {
        let url = format!("{}/address/{}/txs", self.base_url, address);
        let txs = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .json::<Vec<EsploraTx>>()
            .await
            .map_err(|e| AppError::BlockchainRPC(format!("Invalid address txs payload: {}", e)))?;
        Ok(txs)
    }
}

#[async_trait]
impl ChainClient for BitcoinClient {
    fn chain(&self) -> Chain {
        Chain::Bitcoin
    }

    async fn get_tip_height(&self) -> Option<u64> {
        match self.fetch_tip_height().await {
            Ok(height) => Some(height),
            Err(e) => {
                tracing::warn!("Bitcoin tip height unavailable: {}", e);
                None
            }
        }
    }

    async fn fetch_outgoing_since(&self, address: &str, watermark: u64, tip: u64) -> Vec<RawTx> {
        match self.fetch_address_txs(address).await {
            Ok(txs) => {
                let outgoing = select_outgoing(txs, address, watermark, tip);
                tracing::debug!(
                    "Bitcoin {}: {} outgoing txs in ({}, {}]",
                    address,
                    outgoing.len(),
                    watermark,
                    tip
                );
                outgoing
            }
            Err(e) => {
                tracing::warn!("Bitcoin tx fetch failed for {}: {}", address, e);
                Vec::new()
            }
        }
    }
}
