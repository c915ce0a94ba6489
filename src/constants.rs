/// Application constants

// External endpoints
pub const DEFAULT_CANDIDATE_FEED_URL: &str = "https://hackscan.hackbounty.io/public/hack-address.json";
pub const DEFAULT_MORALIS_API_URL: &str = "https://deep-index.moralis.io/api/v2";
pub const MAILERSEND_API_URL: &str = "https://api.mailersend.com/v1/email";

// Token names
pub const TOKEN_BTC: &str = "BTC";
pub const TOKEN_ETH: &str = "ETH";

// Unit scales
pub const SATS_SCALE: u32 = 8; // 1 BTC = 1e8 sats
pub const WEI_SCALE: u32 = 18; // 1 ETH = 1e18 wei

// Chain client caps (per address, per pass)
pub const BITCOIN_MAX_TXS_PER_FETCH: usize = 25;
pub const ETHEREUM_MAX_BLOCKS_PER_FETCH: u64 = 100;
pub const ETHEREUM_RPC_BATCH_SIZE: usize = 25;

// Scan engine
pub const SCAN_BATCH_SIZE: usize = 5;
pub const UNKNOWN_DESTINATION: &str = "Unknown";
pub const RECENT_TRANSACTIONS_LIMIT: i64 = 10;

// Scheduler
pub const DEFAULT_MONITOR_INTERVAL_MINUTES: u64 = 5;
pub const MAX_MONITOR_INTERVAL_MINUTES: u64 = 24 * 60;

// HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

// Alert email
pub const ALERT_SUBJECT: &str = "Suspicious Transaction Detected";

// API version
pub const API_VERSION: &str = "v1";
