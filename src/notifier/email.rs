//! A client for sending email notifications through a mail API.

use crate::core::EmailSender;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, instrument};

/// A client for a JSON mail API (Mailgun/SendGrid style).
pub struct HttpEmailClient {
    endpoint: String,
    api_key: String,
    sender: String,
    client: reqwest::Client,
}

impl HttpEmailClient {
    /// Creates a new `HttpEmailClient`.
    ///
    /// # Arguments
    /// * `endpoint` - The mail API's message endpoint.
    /// * `api_key` - Bearer credential for the API.
    /// * `sender` - The `from` address stamped on every message.
    pub fn new(endpoint: String, api_key: String, sender: String) -> Self {
        Self {
            endpoint,
            api_key,
            sender,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailClient {
    #[instrument(skip(self, body), fields(recipient))]
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<()> {
        let payload = json!({
            "from": self.sender,
            "to": recipient,
            "subject": subject,
            "text": body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "mail provider rejected message");
            anyhow::bail!("mail provider returned status {}: {}", status, text)
        }
    }
}
