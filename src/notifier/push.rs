//! A client for sending topic-based push notifications.

use crate::core::PushSender;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{error, instrument};

/// A client for an FCM-style HTTP push API.
///
/// Messages are addressed to a topic; every device subscribed to that
/// topic receives the structured data payload and the human-readable
/// notification.
pub struct HttpPushClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpPushClient {
    /// Creates a new `HttpPushClient`.
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushSender for HttpPushClient {
    #[instrument(skip(self, data, body), fields(topic))]
    async fn send(
        &self,
        topic: &str,
        data: &BTreeMap<String, String>,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let payload = json!({
            "to": format!("/topics/{topic}"),
            "data": data,
            "notification": {
                "title": title,
                "body": body,
            },
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
            error!(status = %status, body = %text, "push provider rejected message");
            anyhow::bail!("push provider returned status {}: {}", status, text)
        }
    }
}
