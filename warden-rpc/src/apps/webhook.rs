use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use prople_warden_core::common::types::HubError;
use prople_warden_core::notifier::{EventMessage, WebhookClient};

/// HttpWebhookClient POSTs events as JSON and reports the HTTP status back
#[derive(Clone)]
pub struct HttpWebhookClient {
    client: Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, HubError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| HubError::Internal(err.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, url: &str, event: &EventMessage) -> Result<u16, HubError> {
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|err| HubError::Internal(format!("webhook {}: {}", url, err)))?;

        Ok(response.status().as_u16())
    }
}
