use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};

/// External list of addresses to add to the watch-list.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Raw candidate strings. Failures collapse to an empty list.
    async fn fetch_candidates(&self) -> Vec<String>;
}

/// Feed served as a JSON array of address strings.
pub struct HttpCandidateFeed {
    client: Client,
    url: String,
}

impl HttpCandidateFeed {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }

    // Internal helper that downloads the raw feed payload.
    async fn fetch(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Candidate feed request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "Candidate feed returned {}",
                response.status()
            )));
        }

        let payload: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("Candidate feed parse failed: {}", e)))?;
        Ok(string_entries(payload))
    }
}

// Non-string entries are ignored rather than failing the whole feed.
fn string_entries(payload: Vec<serde_json::Value>) -> Vec<String> {
    payload
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[async_trait]
impl CandidateSource for HttpCandidateFeed {
    async fn fetch_candidates(&self) -> Vec<String> {
        match self.fetch().await {
            Ok(candidates) => {
                tracing::debug!("Candidate feed returned {} entries", candidates.len());
                candidates
            }
            Err(e) => {
                tracing::warn!("Candidate feed unavailable: {}", e);
                Vec::new()
            }
        }
    }
}
