#![allow(dead_code)]
//! Fake channel senders for integration tests.

use async_trait::async_trait;
use flightwatch::core::{EmailSender, PushSender, SmsSender};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::sync::Notify;

/// A fake sender that counts invocations and records payloads.
///
/// Implements all three sender traits so one instance (or three clones)
/// can stand in for the whole channel fan-out.
#[derive(Clone)]
pub struct CountingSender {
    pub count: Arc<AtomicUsize>,
    pub notifier: Arc<Notify>,
    /// Push calls record the data payload as JSON; email/SMS record the
    /// message body.
    pub payloads: Arc<Mutex<Vec<serde_json::Value>>>,
    fail: bool,
}

impl CountingSender {
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            notifier: Arc::new(Notify::new()),
            payloads: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A sender whose every call fails after being recorded.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<serde_json::Value> {
        self.payloads.lock().unwrap().last().cloned()
    }

    /// Blocks until the sender has been invoked `target_count` times.
    pub async fn wait_for_count(&self, target_count: usize, timeout: std::time::Duration) {
        let wait_future = async {
            while self.count.load(Ordering::SeqCst) < target_count {
                self.notifier.notified().await;
            }
        };

        tokio::time::timeout(timeout, wait_future)
            .await
            .expect("Timed out waiting for sender invocations");
    }

    fn record(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        self.payloads.lock().unwrap().push(payload);
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notifier.notify_one();
        if self.fail {
            anyhow::bail!("fake sender configured to fail")
        }
        Ok(())
    }
}

impl Default for CountingSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushSender for CountingSender {
    async fn send(
        &self,
        topic: &str,
        data: &BTreeMap<String, String>,
        title: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        self.record(json!({
            "topic": topic,
            "data": data,
            "title": title,
            "body": body,
        }))
    }
}

#[async_trait]
impl EmailSender for CountingSender {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> anyhow::Result<()> {
        self.record(json!({
            "subject": subject,
            "recipient": recipient,
            "body": body,
        }))
    }
}

#[async_trait]
impl SmsSender for CountingSender {
    async fn send(&self, recipient: &str, body: &str) -> anyhow::Result<()> {
        self.record(json!({
            "recipient": recipient,
            "body": body,
        }))
    }
}
