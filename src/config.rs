use serde::Deserialize;
use std::env;

use crate::constants::{
    DEFAULT_CANDIDATE_FEED_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MONITOR_INTERVAL_MINUTES,
    DEFAULT_MORALIS_API_URL,
};
use crate::utils::is_env_flag_enabled;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Blockchain
    pub bitcoin_api_url: String,
    pub ethereum_rpc_url: String,

    // External APIs
    pub candidate_feed_url: String,
    pub moralis_api_url: String,
    pub moralis_api_key: Option<String>,

    // Email alerts
    pub mailersend_api_key: Option<String>,
    pub mailersend_domain: Option<String>,
    pub receiver_email: Option<String>,

    // Monitor
    pub monitor_interval_minutes: u64,
    pub monitor_autostart: bool,
    pub http_timeout_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

// Internal helper that reads an optional, non-blank env var.
fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            bitcoin_api_url: env::var("BITCOIN_API_URL")?,
            ethereum_rpc_url: env::var("ETHEREUM_RPC_URL")?,

            candidate_feed_url: env_non_empty("CANDIDATE_FEED_URL")
                .unwrap_or_else(|| DEFAULT_CANDIDATE_FEED_URL.to_string()),
            moralis_api_url: env_non_empty("MORALIS_API_URL")
                .unwrap_or_else(|| DEFAULT_MORALIS_API_URL.to_string()),
            moralis_api_key: env_non_empty("MORALIS_API_KEY"),

            mailersend_api_key: env_non_empty("MAILERSEND_API_KEY"),
            mailersend_domain: env_non_empty("MAILERSEND_DOMAIN"),
            receiver_email: env_non_empty("RECEIVER_EMAIL"),

            monitor_interval_minutes: env::var("MONITOR_INTERVAL_MINUTES")
                .unwrap_or_else(|_| DEFAULT_MONITOR_INTERVAL_MINUTES.to_string())
                .parse()?,
            monitor_autostart: is_env_flag_enabled("MONITOR_AUTOSTART"),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_HTTP_TIMEOUT_SECS.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        for (name, value) in [
            ("BITCOIN_API_URL", &self.bitcoin_api_url),
            ("ETHEREUM_RPC_URL", &self.ethereum_rpc_url),
            ("CANDIDATE_FEED_URL", &self.candidate_feed_url),
            ("MORALIS_API_URL", &self.moralis_api_url),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} is empty", name);
            }
            url::Url::parse(value).map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e))?;
        }
        if self.monitor_interval_minutes == 0 {
            anyhow::bail!("MONITOR_INTERVAL_MINUTES must be > 0");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be > 0");
        }

        if self.moralis_api_key.is_none() {
            tracing::warn!("MORALIS_API_KEY not set; every destination will resolve to Unknown");
        }
        if !self.email_configured() {
            tracing::warn!(
                "MAILERSEND_API_KEY, MAILERSEND_DOMAIN or RECEIVER_EMAIL missing; alerts will not be emailed"
            );
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn email_configured(&self) -> bool {
        self.mailersend_api_key.is_some()
            && self.mailersend_domain.is_some()
            && self.receiver_email.is_some()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "0.0.0.0".to_string(),
        port: 3000,
        environment: "development".to_string(),
        database_url: "postgres://localhost/outflow".to_string(),
        database_max_connections: 1,
        bitcoin_api_url: "http://localhost:3002/api".to_string(),
        ethereum_rpc_url: "http://localhost:8545".to_string(),
        candidate_feed_url: "http://localhost:9000/addresses.json".to_string(),
        moralis_api_url: "http://localhost:9001/api/v2".to_string(),
        moralis_api_key: None,
        mailersend_api_key: None,
        mailersend_domain: None,
        receiver_email: None,
        monitor_interval_minutes: 5,
        monitor_autostart: false,
        http_timeout_secs: 15,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = test_config();
        config.monitor_interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_rpc_url() {
        // Ensures URL fields are parsed, not just checked for emptiness
        let mut config = test_config();
        config.ethereum_rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn email_configured_requires_all_three_fields() {
        let mut config = test_config();
        config.mailersend_api_key = Some("key".to_string());
        config.mailersend_domain = Some("example.com".to_string());
        assert!(!config.email_configured());
        config.receiver_email = Some("ops@example.com".to_string());
        assert!(config.email_configured());
    }
}
