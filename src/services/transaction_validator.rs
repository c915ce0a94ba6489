use crate::{
    indexer::address_classifier::is_valid_format,
    models::{Chain, DetectedTransaction},
};

const TX_HASH_HEX_LEN: usize = 64;

fn is_hex(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Ethereum hashes carry a `0x` prefix, bitcoin txids do not.
pub fn is_valid_tx_hash(hash: &str, chain: Chain) -> bool {
    let body = match chain {
        Chain::Ethereum => match hash.strip_prefix("0x").or_else(|| hash.strip_prefix("0X")) {
            Some(body) => body,
            None => return false,
        },
        Chain::Bitcoin => hash,
    };
    body.len() == TX_HASH_HEX_LEN && is_hex(body)
}

fn rejection_reason(tx: &DetectedTransaction) -> Option<String> {
    if tx.from_address.trim().is_empty() {
        return Some("missing from_address".to_string());
    }
    if tx.to_address.trim().is_empty() {
        return Some("missing to_address".to_string());
    }
    if tx.tx_hash.trim().is_empty() {
        return Some("missing tx_hash".to_string());
    }

    let Some(chain) = Chain::parse(&tx.chain) else {
        return Some(format!("unsupported chain '{}'", tx.chain));
    };

    if !is_valid_format(&tx.from_address, chain) {
        return Some(format!("invalid {} sender '{}'", chain, tx.from_address));
    }
    if let Some(bad) = tx
        .to_address
        .split(',')
        .map(str::trim)
        .find(|to| !is_valid_format(to, chain))
    {
        return Some(format!("invalid {} recipient '{}'", chain, bad));
    }
    if !is_valid_tx_hash(&tx.tx_hash, chain) {
        return Some(format!("invalid {} tx hash", chain));
    }
    // Unconfirmed or missing heights come back as 0
    if tx.block_height <= 0 {
        return Some(format!("invalid block height {}", tx.block_height));
    }

    None
}

/// Schema and format check run before a detected transaction is persisted.
/// Rejections are logged and never retried.
pub fn validate(tx: &DetectedTransaction) -> bool {
    match rejection_reason(tx) {
        None => true,
        Some(reason) => {
            tracing::warn!("Dropping transaction {}: {}", tx.tx_hash, reason);
            false
        }
    }
}
