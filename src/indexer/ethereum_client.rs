use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, future::Future, ops::RangeInclusive, sync::Arc};
use tokio::sync::Mutex;

use super::{ChainClient, RawOutput, RawTx};
use crate::{
    constants::{ETHEREUM_MAX_BLOCKS_PER_FETCH, ETHEREUM_RPC_BATCH_SIZE, WEI_SCALE},
    error::{AppError, Result},
    models::Chain,
    utils::{parse_hex_u128, parse_hex_u64},
};

// Internal helper that builds a JSON-RPC 2.0 request body.
fn rpc_request(method: &str, params: serde_json::Value, id: u64) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id
    })
}

fn get_block_request(block_number: u64) -> serde_json::Value {
    rpc_request(
        "eth_getBlockByNumber",
        serde_json::json!([format!("0x{:x}", block_number), true]),
        block_number,
    )
}

/// Most recent `ETHEREUM_MAX_BLOCKS_PER_FETCH` blocks of `(watermark, tip]`.
fn scan_window(watermark: u64, tip: u64) -> Option<RangeInclusive<u64>> {
    let start = watermark
        .saturating_add(1)
        .max(tip.saturating_sub(ETHEREUM_MAX_BLOCKS_PER_FETCH - 1));
    if start > tip {
        return None;
    }
    Some(start..=tip)
}

fn wei_to_eth(raw: &str) -> Option<Decimal> {
    let wei = i128::try_from(parse_hex_u128(raw)?).ok()?;
    Decimal::try_from_i128_with_scale(wei, WEI_SCALE).ok()
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Block {
    number: String,
    #[serde(default)]
    transactions: Vec<BlockTransaction>,
}

#[derive(Debug, Deserialize)]
struct BlockTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    #[serde(default)]
    value: String,
}

// Internal helper that keeps transactions sent by `address` in a block
// inside `(watermark, tip]`.
fn outgoing_in_block(block: &Block, address: &str, watermark: u64, tip: u64) -> Vec<RawTx> {
    let Some(height) = parse_hex_u64(&block.number) else {
        tracing::warn!("Ethereum block with invalid number '{}' skipped", block.number);
        return Vec::new();
    };
    if height <= watermark || height > tip {
        return Vec::new();
    }

    block
        .transactions
        .iter()
        .filter(|tx| tx.from.eq_ignore_ascii_case(address))
        .filter_map(|tx| {
            let Some(amount) = wei_to_eth(&tx.value) else {
                tracing::warn!("Ethereum tx {} has unreadable value '{}'", tx.hash, tx.value);
                return None;
            };
            Some(RawTx {
                tx_hash: tx.hash.clone(),
                block_height: height,
                outputs: vec![RawOutput {
                    address: tx.to.as_ref().map(|to| to.to_ascii_lowercase()),
                    amount,
                }],
            })
        })
        .collect()
}

/// Full blocks shared by every address scanned against the same tip. Only the
/// newest `ETHEREUM_MAX_BLOCKS_PER_FETCH` heights are kept, since no scan
/// window reaches further back.
#[derive(Default)]
struct BlockCache {
    blocks: HashMap<u64, Arc<Block>>,
}

impl BlockCache {
    /// Returns the cached blocks of `window`, fetching only the missing
    /// heights in chunks of `ETHEREUM_RPC_BATCH_SIZE`. Failed chunks are
    /// logged and left out.
    async fn load<F, Fut>(&mut self, window: RangeInclusive<u64>, fetch: F) -> Vec<Arc<Block>>
    where
        F: Fn(Vec<u64>) -> Fut,
        Fut: Future<Output = Result<Vec<Block>>>,
    {
        let floor = window
            .end()
            .saturating_sub(ETHEREUM_MAX_BLOCKS_PER_FETCH - 1);
        self.blocks.retain(|height, _| *height >= floor);

        let missing: Vec<u64> = window
            .clone()
            .filter(|height| !self.blocks.contains_key(height))
            .collect();

        for chunk in missing.chunks(ETHEREUM_RPC_BATCH_SIZE) {
            match fetch(chunk.to_vec()).await {
                Ok(fetched) => {
                    for block in fetched {
                        match parse_hex_u64(&block.number) {
                            Some(height) => {
                                self.blocks.insert(height, Arc::new(block));
                            }
                            None => tracing::warn!(
                                "Ethereum block with invalid number '{}' skipped",
                                block.number
                            ),
                        }
                    }
                }
                Err(e) => tracing::warn!(
                    "Ethereum block batch {}..={} failed: {}",
                    chunk.first().copied().unwrap_or_default(),
                    chunk.last().copied().unwrap_or_default(),
                    e
                ),
            }
        }

        window
            .filter_map(|height| self.blocks.get(&height).cloned())
            .collect()
    }
}

/// Ethereum JSON-RPC client. Scans full blocks using batched
/// `eth_getBlockByNumber` calls.
pub struct EthereumClient {
    client: Client,
    rpc_url: String,
    blocks: Mutex<BlockCache>,
}

impl EthereumClient {
    pub fn new(client: Client, rpc_url: String) -> Self {
        Self {
            client,
            rpc_url,
            blocks: Mutex::new(BlockCache::default()),
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }

    async fn get_block_number(&self) -> Result<u64> {
        let response: RpcResponse<String> = self
            .call(rpc_request("eth_blockNumber", serde_json::json!([]), 1))
            .await?;
        if let Some(err) = response.error {
            return Err(AppError::BlockchainRPC(format!("RPC error: {}", err)));
        }
        let raw = response
            .result
            .ok_or_else(|| AppError::BlockchainRPC("Empty eth_blockNumber result".to_string()))?;
        parse_hex_u64(&raw)
            .ok_or_else(|| AppError::BlockchainRPC(format!("Invalid block number '{}'", raw)))
    }

    /// One JSON-RPC batch of `eth_getBlockByNumber` calls. Missing blocks and
    /// per-entry errors are logged and skipped.
    async fn get_blocks(&self, blocks: &[u64]) -> Result<Vec<Block>> {
        let batch: Vec<serde_json::Value> = blocks.iter().map(|b| get_block_request(*b)).collect();
        let responses: Vec<RpcResponse<Block>> =
            self.call(serde_json::Value::Array(batch)).await?;

        let mut out = Vec::with_capacity(responses.len());
        for response in responses {
            match (response.result, response.error) {
                (Some(block), _) => out.push(block),
                (None, Some(err)) => tracing::debug!("eth_getBlockByNumber error: {}", err),
                (None, None) => {}
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    async fn get_tip_height(&self) -> Option<u64> {
        match self.get_block_number().await {
            Ok(height) => Some(height),
            Err(e) => {
                tracing::warn!("Ethereum tip height unavailable: {}", e);
                None
            }
        }
    }

    async fn fetch_outgoing_since(&self, address: &str, watermark: u64, tip: u64) -> Vec<RawTx> {
        let Some(window) = scan_window(watermark, tip) else {
            return Vec::new();
        };
        // Held across the fetch so concurrent scans wait for the first download
        let blocks = {
            let mut cache = self.blocks.lock().await;
            cache
                .load(window.clone(), |chunk| async move {
                    self.get_blocks(&chunk).await
                })
                .await
        };

        let outgoing: Vec<RawTx> = blocks
            .iter()
            .flat_map(|block| outgoing_in_block(block, address, watermark, tip))
            .collect();

        tracing::debug!(
            "Ethereum {}: {} outgoing txs in blocks {:?}",
            address,
            outgoing.len(),
            window
        );
        outgoing
    }
}
