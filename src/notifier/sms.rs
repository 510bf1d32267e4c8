//! A client for sending SMS notifications through a messaging API.

use crate::core::SmsSender;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, instrument};

/// A client for a Twilio-style form-encoded SMS API.
pub struct HttpSmsClient {
    endpoint: String,
    api_key: String,
    from_number: String,
    client: reqwest::Client,
}

impl HttpSmsClient {
    /// Creates a new `HttpSmsClient`.
    ///
    /// # Arguments
    /// * `endpoint` - The messaging API's message-create endpoint.
    /// * `api_key` - Bearer credential for the API.
    /// * `from_number` - The sending phone number.
    pub fn new(endpoint: String, api_key: String, from_number: String) -> Self {
        Self {
            endpoint,
            api_key,
            from_number,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsClient {
    #[instrument(skip(self, body), fields(recipient))]
    async fn send(&self, recipient: &str, body: &str) -> Result<()> {
        let form = [
            ("From", self.from_number.as_str()),
            ("To", recipient),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "sms provider rejected message");
            anyhow::bail!("sms provider returned status {}: {}", status, text)
        }
    }
}
