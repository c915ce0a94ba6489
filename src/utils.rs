// Utility helpers

/// True when the env var is set to 1/true/yes/on (case-insensitive).
pub fn is_env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

/// Parses a `0x`-prefixed hex quantity as returned by Ethereum JSON-RPC.
pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    let digits = raw.trim().strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Same as [`parse_hex_u64`] for 128-bit quantities (wei values).
pub fn parse_hex_u128(raw: &str) -> Option<u128> {
    let digits = raw.trim().strip_prefix("0x")?;
    if digits.is_empty() {
        return Some(0);
    }
    u128::from_str_radix(digits, 16).ok()
}
