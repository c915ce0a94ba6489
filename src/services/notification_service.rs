use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::{
    config::Config,
    constants::{ALERT_SUBJECT, MAILERSEND_API_URL},
    error::{AppError, Result},
    models::DetectedTransaction,
};

/// Alert sink for newly detected transactions. A failed alert never rolls
/// back the stored transaction.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, tx: &DetectedTransaction) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
}

#[derive(Debug, Serialize)]
struct EmailRequest {
    from: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text: String,
}

/// Plain-text alert body, one field per line.
pub fn format_alert_body(tx: &DetectedTransaction) -> String {
    format!(
        "Fund Destination: {}\nDestination Address: {}\nToken Amount: {}\nToken Name: {}\nTx Hash: {}:{}#{}",
        tx.destination_label,
        tx.to_address,
        tx.amount.normalize(),
        tx.token_name,
        tx.chain,
        tx.tx_hash,
        tx.block_height
    )
}

struct EmailSettings {
    api_key: String,
    domain: String,
    receiver: String,
}

/// MailerSend email notifier.
pub struct EmailNotifier {
    client: Client,
    api_url: String,
    settings: Option<EmailSettings>,
    log_bodies: bool,
}

impl EmailNotifier {
    pub fn new(client: Client, config: &Config) -> Self {
        let settings = match (
            config.mailersend_api_key.clone(),
            config.mailersend_domain.clone(),
            config.receiver_email.clone(),
        ) {
            (Some(api_key), Some(domain), Some(receiver)) => Some(EmailSettings {
                api_key,
                domain,
                receiver,
            }),
            _ => None,
        };

        Self {
            client,
            api_url: MAILERSEND_API_URL.to_string(),
            settings,
            log_bodies: config.is_development(),
        }
    }

    fn build_request(settings: &EmailSettings, tx: &DetectedTransaction) -> EmailRequest {
        EmailRequest {
            from: EmailAddress {
                email: format!("noreply@{}", settings.domain),
            },
            to: vec![EmailAddress {
                email: settings.receiver.clone(),
            }],
            subject: ALERT_SUBJECT.to_string(),
            text: format_alert_body(tx),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, tx: &DetectedTransaction) -> Result<()> {
        let Some(settings) = self.settings.as_ref() else {
            return Err(AppError::Internal(
                "Email alerts are not configured".to_string(),
            ));
        };

        let request = Self::build_request(settings, tx);
        if self.log_bodies {
            tracing::debug!("Alert email for {}:\n{}", tx.tx_hash, request.text);
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(settings.api_key.trim())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("MailerSend request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalAPI(format!(
                "MailerSend returned {}: {}",
                status, body
            )));
        }

        tracing::info!("Alert email sent for {}", tx.tx_hash);
        Ok(())
    }
}
