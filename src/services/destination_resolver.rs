use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::Config,
    constants::UNKNOWN_DESTINATION,
    error::{AppError, Result},
};

/// Best-effort label lookup for a recipient address. Never fails: anything
/// short of a usable label resolves to "Unknown".
#[async_trait]
pub trait LabelResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct LabelsResponse {
    #[serde(default)]
    labels: Vec<WalletLabel>,
}

#[derive(Debug, Deserialize)]
struct WalletLabel {
    name: Option<String>,
}

// Internal helper that picks the first non-empty label name.
fn first_label(response: LabelsResponse) -> Option<String> {
    response
        .labels
        .into_iter()
        .filter_map(|label| label.name)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

/// Moralis wallet-labels API.
pub struct MoralisResolver {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MoralisResolver {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.moralis_api_url.trim_end_matches('/').to_string(),
            api_key: config.moralis_api_key.clone(),
        }
    }

    // Internal helper that queries the labels endpoint for one address.
    async fn fetch_label(&self, api_key: &str, address: &str) -> Result<Option<String>> {
        let url = format!("{}/wallet/{}/labels", self.base_url, address);
        let response = self
            .client
            .get(url)
            .header("X-API-Key", api_key.trim())
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Label request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "Label request returned {}",
                response.status()
            )));
        }

        let body: LabelsResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Label response parse failed: {}", e)))?;
        Ok(first_label(body))
    }
}

#[async_trait]
impl LabelResolver for MoralisResolver {
    async fn resolve(&self, address: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return UNKNOWN_DESTINATION.to_string();
        };

        match self.fetch_label(api_key, address).await {
            Ok(Some(label)) => label,
            Ok(None) => UNKNOWN_DESTINATION.to_string(),
            Err(e) => {
                tracing::debug!("No label for {}: {}", address, e);
                UNKNOWN_DESTINATION.to_string()
            }
        }
    }
}
