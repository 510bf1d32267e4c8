//! Document store collaborators.
//!
//! The store traits in [`crate::core`] are the seam to the persistence
//! layer; this module provides [`MemoryStore`], an in-process implementation
//! backed by `RwLock`-protected maps. A database-backed implementation
//! slots in behind the same traits without touching the rest of the crate.

use crate::core::{Account, AccountStore, FlightRecord, FlightStore};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key being inserted already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// The store could not complete the operation. A write that fails with
    /// this error may be in an indeterminate state.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// An in-memory document store keyed by natural business keys.
#[derive(Debug, Default)]
pub struct MemoryStore {
    flights: RwLock<HashMap<String, FlightRecord>>,
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlightStore for MemoryStore {
    async fn find(&self, flight_id: &str) -> Result<Option<FlightRecord>, StoreError> {
        let flights = self.flights.read().await;
        Ok(flights.get(flight_id).cloned())
    }

    async fn upsert(&self, flight_id: &str, record: FlightRecord) -> Result<(), StoreError> {
        let mut flights = self.flights.write().await;
        flights.insert(flight_id.to_string(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FlightRecord>, StoreError> {
        let flights = self.flights.read().await;
        let mut records: Vec<FlightRecord> = flights.values().cloned().collect();
        records.sort_by(|a, b| a.flight_id.cmp(&b.flight_id));
        Ok(records)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(username).cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(StoreError::Duplicate(account.username));
        }
        accounts.insert(account.username.clone(), account);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }
}
