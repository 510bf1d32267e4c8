//! The status update orchestrator and account operations.
//!
//! [`StatusService`] serializes the read-modify-notify sequence for a
//! flight: validate, persist through the store collaborator, re-read the
//! canonical record, then hand the event to the best-effort fan-out
//! (dispatcher + hub) on a detached task. Failures on the critical path
//! (validation, auth, persistence) propagate to the caller; failures on
//! the best-effort path are logged and never do.

use crate::auth::{hash_password, verify_password, Authenticator};
use crate::core::{
    Account, AccountStore, FlightRecord, FlightStatusEvent, FlightStore, Recipients,
};
use crate::hub::ConnectionHub;
use crate::notifier::dispatcher::Dispatcher;
use crate::store::StoreError;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{error, info};

static EMAIL_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\S+@\S+\.\S+$").expect("static email pattern"));
static PHONE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\+[0-9]{7,15}$").expect("static phone pattern"));

/// Critical-path failures surfaced to API callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request is malformed; rejected before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing, invalid, or expired credentials; rejected before any
    /// side effect.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The username is already registered.
    #[error("already registered: {0}")]
    Duplicate(String),

    /// The requested flight does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The persistence layer failed; the write may be in an indeterminate
    /// state.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A new-account request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Flights this account wants notifications for.
    #[serde(default)]
    pub watchlist: Vec<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.username.len() < 3 || self.username.len() > 50 {
            return Err(ServiceError::Validation(
                "username must be 3 to 50 characters".into(),
            ));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ServiceError::Validation("invalid email address".into()));
        }
        if self.password.len() < 6 {
            return Err(ServiceError::Validation(
                "password must be at least 6 characters".into(),
            ));
        }
        if let Some(phone) = &self.phone {
            if !PHONE_RE.is_match(phone) {
                return Err(ServiceError::Validation(
                    "phone must be E.164, e.g. +15550001111".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Orchestrates status updates and account operations over injected
/// collaborators.
pub struct StatusService {
    flights: Arc<dyn FlightStore>,
    accounts: Arc<dyn AccountStore>,
    dispatcher: Arc<Dispatcher>,
    hub: Arc<ConnectionHub>,
    authenticator: Arc<Authenticator>,
}

impl StatusService {
    /// Creates a new `StatusService`.
    pub fn new(
        flights: Arc<dyn FlightStore>,
        accounts: Arc<dyn AccountStore>,
        dispatcher: Arc<Dispatcher>,
        hub: Arc<ConnectionHub>,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            flights,
            accounts,
            dispatcher,
            hub,
            authenticator,
        }
    }

    /// The connection hub serving the live observer transport.
    pub fn hub(&self) -> Arc<ConnectionHub> {
        self.hub.clone()
    }

    /// Validates a bearer token and returns the identity it belongs to.
    pub fn authorize(&self, token: &str) -> Result<String, ServiceError> {
        self.authenticator
            .verify_token(token)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))
    }

    /// Registers a new account.
    pub async fn register(&self, request: RegisterRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let (salt, password_hash) = hash_password(&request.password);
        let account = Account {
            username: request.username,
            email: request.email,
            password_hash,
            salt,
            phone: request.phone,
            watchlist: request.watchlist,
        };
        match self.accounts.insert(account).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(username)) => {
                Err(ServiceError::Duplicate(format!("username {username}")))
            }
            Err(e) => Err(e.into()),
        }
        .inspect(|_| info!("user registered"))
    }

    /// Verifies credentials and issues a bearer token.
    ///
    /// Invalid credentials yield [`ServiceError::Unauthorized`], never an
    /// account record.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ServiceError> {
        let account = self.accounts.find(username).await?;
        let valid = account
            .as_ref()
            .map(|a| verify_password(password, &a.salt, &a.password_hash))
            .unwrap_or(false);
        if !valid {
            return Err(ServiceError::Unauthorized(
                "incorrect username or password".into(),
            ));
        }
        self.authenticator
            .issue_token(username)
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))
    }

    /// Applies a status change: persist, then notify.
    ///
    /// The returned record is re-read from the store, so the response
    /// reflects exactly what persisted. Notification and broadcast run on
    /// a detached task: once the write has succeeded they proceed to
    /// completion whether or not the original caller is still waiting, and
    /// their failures never turn the status update into an error.
    pub async fn update_status(
        &self,
        event: FlightStatusEvent,
    ) -> Result<FlightRecord, ServiceError> {
        event.validate().map_err(ServiceError::Validation)?;

        let existing = self.flights.find(&event.flight_id).await?;
        self.flights
            .upsert(&event.flight_id, FlightRecord::from_event(&event))
            .await?;
        if existing.is_some() {
            info!(flight_id = %event.flight_id, "flight status updated");
        } else {
            info!(flight_id = %event.flight_id, "flight status added");
        }

        let canonical = self.flights.find(&event.flight_id).await?.ok_or_else(|| {
            StoreError::Unavailable("record missing immediately after upsert".into())
        })?;

        self.spawn_fan_out(event);
        Ok(canonical)
    }

    /// Looks up the canonical record for one flight.
    pub async fn get_status(&self, flight_id: &str) -> Result<FlightRecord, ServiceError> {
        self.flights
            .find(flight_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("flight {flight_id}")))
    }

    /// Returns all known flight records.
    pub async fn list_flights(&self) -> Result<Vec<FlightRecord>, ServiceError> {
        Ok(self.flights.list().await?)
    }

    /// Runs the best-effort fan-out (dispatcher + hub broadcast) detached
    /// from the caller.
    fn spawn_fan_out(&self, event: FlightStatusEvent) {
        let accounts = self.accounts.clone();
        let dispatcher = self.dispatcher.clone();
        let hub = self.hub.clone();
        tokio::spawn(async move {
            match resolve_recipients(accounts.as_ref(), &event.flight_id).await {
                Ok(recipients) => {
                    let summary = dispatcher.dispatch(&event, &recipients).await;
                    info!(flight_id = %event.flight_id, ?summary, "notification dispatch complete");
                }
                Err(e) => {
                    // Best-effort path: log and move on to the broadcast.
                    error!(flight_id = %event.flight_id, error = %e, "could not resolve notification recipients");
                }
            }

            let notice = format!("Flight {} status updated", event.flight_id);
            hub.broadcast(&notice).await;
        });
    }
}

/// Resolves who should be notified about a flight.
///
/// Push targets the flight's topic; email and SMS go to every account
/// whose watchlist names the flight (SMS only where a phone number is on
/// file).
async fn resolve_recipients(
    accounts: &dyn AccountStore,
    flight_id: &str,
) -> Result<Recipients, StoreError> {
    let mut recipients = Recipients {
        topic: flight_id.to_string(),
        ..Default::default()
    };
    for account in accounts.list().await? {
        if account.watchlist.iter().any(|f| f == flight_id) {
            recipients.emails.push(account.email.clone());
            if let Some(phone) = account.phone {
                recipients.phones.push(phone);
            }
        }
    }
    Ok(recipients)
}
