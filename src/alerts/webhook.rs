use crate::error::{LinkPeekError, Result};

use super::{AlertSink, ChannelAlert};

/// Delivers alerts by POSTing the alert JSON to a configured webhook URL.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, alert: &ChannelAlert) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| LinkPeekError::Alert(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(LinkPeekError::Alert(format!(
                "Webhook error {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
