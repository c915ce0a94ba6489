use crate::models::Chain;

const BITCOIN_BODY_MIN_LEN: usize = 25;
const BITCOIN_BODY_MAX_LEN: usize = 62;
const ETHEREUM_HEX_LEN: usize = 40;

/// Lowercases and trims an address before storage or comparison.
pub fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Maps an address to its chain purely by prefix.
pub fn classify(address: &str) -> Option<Chain> {
    let address = normalize(address);
    if address.starts_with("bc1") || address.starts_with('1') || address.starts_with('3') {
        Some(Chain::Bitcoin)
    } else if address.starts_with("0x") {
        Some(Chain::Ethereum)
    } else {
        None
    }
}

/// Structural check (prefix, length, alphabet) for the given chain.
pub fn is_valid_format(address: &str, chain: Chain) -> bool {
    match chain {
        Chain::Bitcoin => is_valid_bitcoin(address),
        Chain::Ethereum => is_valid_ethereum(address),
    }
}

// Uppercase I and O never appear in base58 or bech32.
fn is_bitcoin_body_char(c: char) -> bool {
    c.is_ascii_alphanumeric() && c != 'I' && c != 'O'
}

// Internal helper that expects the lowercase `bc1` prefix, as stored after
// `normalize`. Base58 bodies keep their case.
fn is_valid_bitcoin(address: &str) -> bool {
    let address = address.trim();
    let body = if let Some(body) = address.strip_prefix("bc1") {
        body
    } else if address.starts_with('1') || address.starts_with('3') {
        &address[1..]
    } else {
        return false;
    };

    (BITCOIN_BODY_MIN_LEN..=BITCOIN_BODY_MAX_LEN).contains(&body.len())
        && body.chars().all(is_bitcoin_body_char)
}

// Internal helper that accepts checksummed or lowercase hex.
fn is_valid_ethereum(address: &str) -> bool {
    let address = normalize(address);
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    hex.len() == ETHEREUM_HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit())
}
