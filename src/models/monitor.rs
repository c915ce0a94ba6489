use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// ==================== CHAIN ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "bitcoin",
            Chain::Ethereum => "ethereum",
        }
    }

    /// Parses a stored chain value. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bitcoin" => Some(Chain::Bitcoin),
            "ethereum" => Some(Chain::Ethereum),
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== WATCHED ADDRESS ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchedAddress {
    pub address: String,
    pub chain: String,
    #[sqlx(rename = "last_checked_block")]
    #[serde(rename = "last_checked_block")]
    pub watermark: i64,
}

impl WatchedAddress {
    pub fn new(address: String, chain: Chain) -> Self {
        Self {
            address,
            chain: chain.as_str().to_string(),
            watermark: 0,
        }
    }

    /// Watermark as a block height; negative values read as 0.
    pub fn watermark_height(&self) -> u64 {
        u64::try_from(self.watermark).unwrap_or(0)
    }
}

// ==================== DETECTED TRANSACTION ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DetectedTransaction {
    pub chain: String,
    pub from_address: String,
    /// Comma-separated for multi-output (bitcoin) transactions.
    pub to_address: String,
    pub amount: Decimal,
    pub token_name: String,
    pub tx_hash: String,
    pub block_height: i64,
    pub destination_label: String,
    pub timestamp: DateTime<Utc>,
}

// ==================== MONITOR RUN STATE ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "error" => RunStatus::Error,
            _ => RunStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRunState {
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub last_error: Option<String>,
}

impl Default for MonitorRunState {
    fn default() -> Self {
        Self {
            is_active: false,
            last_run_at: None,
            last_completed_at: None,
            status: RunStatus::Idle,
            last_error: None,
        }
    }
}

impl MonitorRunState {
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.last_run_at = Some(now);
        self.status = RunStatus::Running;
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.last_completed_at = Some(now);
        self.status = RunStatus::Completed;
        self.last_error = None;
    }

    pub fn mark_error(&mut self, message: String) {
        self.is_active = false;
        self.status = RunStatus::Error;
        self.last_error = Some(message);
    }
}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
