//! Core domain types and service traits for FlightWatch
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::store::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single flight status change, as submitted by a caller.
///
/// Immutable once validated; one instance per status change. Both fan-out
/// components (dispatcher and hub) consume the same instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FlightStatusEvent {
    /// Stable flight identifier, e.g. "AA123". Must be non-empty.
    pub flight_id: String,
    /// Free-form status label, e.g. "Delayed", "On Time".
    pub status: String,
    /// Assigned gate, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    /// Delay in minutes. Absent means no delay is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
}

impl FlightStatusEvent {
    /// Checks the event against the shape contract.
    ///
    /// # Returns
    /// * `Ok(())` if the event is well-formed
    /// * `Err` with a human-readable reason otherwise
    pub fn validate(&self) -> Result<(), String> {
        if self.flight_id.trim().is_empty() {
            return Err("flight_id must not be empty".to_string());
        }
        Ok(())
    }

    /// Gate label for human-readable output.
    pub fn gate_label(&self) -> String {
        self.gate
            .clone()
            .unwrap_or_else(|| "Not Assigned".to_string())
    }

    /// Delay label for human-readable output.
    pub fn delay_label(&self) -> String {
        self.delay
            .map(|d| d.to_string())
            .unwrap_or_else(|| "No Delay".to_string())
    }
}

/// The canonical stored shape of a flight's status.
///
/// This is what the store persists and what callers get back: the event
/// fields plus store-assigned metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightRecord {
    /// Stable flight identifier; the natural key for upserts.
    pub flight_id: String,
    /// Current status label.
    pub status: String,
    /// Assigned gate, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
    /// Delay in minutes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    /// When this record was last written.
    pub updated_at: DateTime<Utc>,
}

impl FlightRecord {
    /// Builds the record that persisting `event` now would produce.
    pub fn from_event(event: &FlightStatusEvent) -> Self {
        Self {
            flight_id: event.flight_id.clone(),
            status: event.status.clone(),
            gate: event.gate.clone(),
            delay: event.delay,
            updated_at: Utc::now(),
        }
    }
}

/// A registered user account.
///
/// Passwords are never stored in clear; only the salted hash is kept.
/// The watchlist names the flights this account wants notifications for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Unique username; the natural key for account lookups.
    pub username: String,
    /// Notification email address.
    pub email: String,
    /// Hex-encoded salted password hash.
    pub password_hash: String,
    /// Hex-encoded per-account salt.
    pub salt: String,
    /// Phone number for SMS notifications, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Flight identifiers this account subscribes to.
    #[serde(default)]
    pub watchlist: Vec<String>,
}

/// One of the three notification delivery mechanisms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Push,
    Email,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Email => write!(f, "email"),
            Self::Sms => write!(f, "sms"),
        }
    }
}

/// Outcome of one channel's delivery attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Failed,
}

/// Per-channel delivery outcome for a single dispatch.
///
/// Ephemeral; a dispatch produces exactly one of these per configured
/// channel, no matter how many channels failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchResult {
    /// The channel this result belongs to.
    pub channel: Channel,
    /// Whether the delivery attempt succeeded.
    pub outcome: DispatchOutcome,
    /// Error or delivery detail, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DispatchResult {
    /// A successful result for `channel`.
    pub fn sent(channel: Channel, detail: Option<String>) -> Self {
        Self {
            channel,
            outcome: DispatchOutcome::Sent,
            detail,
        }
    }

    /// A failed result for `channel` carrying the error text.
    pub fn failed(channel: Channel, detail: impl Into<String>) -> Self {
        Self {
            channel,
            outcome: DispatchOutcome::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// Notification targets resolved for one event.
///
/// Push is topic-based (the topic is the flight identifier); email and SMS
/// carry explicit recipient lists resolved from account watchlists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    /// Push topic, normally the flight identifier.
    pub topic: String,
    /// Email addresses of subscribed accounts.
    pub emails: Vec<String>,
    /// Phone numbers of subscribed accounts that have one on file.
    pub phones: Vec<String>,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Persistent storage of flight records, keyed by `flight_id`
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Looks up the record for a flight
    ///
    /// # Returns
    /// * `Ok(Some(record))` if the flight is known
    /// * `Ok(None)` if it is not
    /// * `Err` if the store itself failed
    async fn find(&self, flight_id: &str) -> Result<Option<FlightRecord>, StoreError>;

    /// Inserts or overwrites the record for `flight_id`
    async fn upsert(&self, flight_id: &str, record: FlightRecord) -> Result<(), StoreError>;

    /// Returns all known flight records
    async fn list(&self) -> Result<Vec<FlightRecord>, StoreError>;
}

/// Persistent storage of user accounts, keyed by username
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Looks up an account by username
    async fn find(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Inserts a new account
    ///
    /// # Returns
    /// * `Err(StoreError::Duplicate)` if the username is already taken
    async fn insert(&self, account: Account) -> Result<(), StoreError>;

    /// Returns all registered accounts
    async fn list(&self) -> Result<Vec<Account>, StoreError>;
}

/// Sends push notifications to a topic
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Delivers a structured data payload plus a human-readable notification
    /// to every device subscribed to `topic`.
    ///
    /// The `data` map must already be sanitized: all values stringified,
    /// absent fields omitted. Providers reject null values.
    async fn send(
        &self,
        topic: &str,
        data: &BTreeMap<String, String>,
        title: &str,
        body: &str,
    ) -> Result<()>;
}

/// Sends email notifications
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message to one recipient
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<()>;
}

/// Sends SMS notifications
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Sends one text message to one phone number
    async fn send(&self, recipient: &str, body: &str) -> Result<()>;
}
