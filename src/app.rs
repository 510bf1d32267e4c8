//! The main application logic, decoupled from the entry point.

use crate::{
    auth::Authenticator,
    config::Config,
    core::{AccountStore, EmailSender, FlightStore, PushSender, SmsSender},
    hub::ConnectionHub,
    metrics::{install_recorder, MetricsServer},
    notifier::{
        dispatcher::Dispatcher, email::HttpEmailClient, push::HttpPushClient, sms::HttpSmsClient,
    },
    server::{self, AppState},
    service::StatusService,
    store::MemoryStore,
};
use anyhow::Result;
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// A handle to the running application, containing all its task handles.
pub struct App {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_rx: watch::Receiver<bool>,
    api_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the API listener actually bound to.
    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    /// The address the metrics listener bound to, if metrics are enabled.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Waits for the shutdown signal and then gracefully shuts down all
    /// tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        shutdown_rx.changed().await.ok();
        info!(
            "Shutdown signal received. Waiting for {} tasks to complete...",
            self.handles.len()
        );

        let (names, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(()) => debug!(task_name = name, "Task shut down gracefully."),
                Err(e) => error!(task_name = name, error = %e, "Task panicked during shutdown."),
            }
        }

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// This pattern allows for a clean separation of concerns between
/// constructing the application's components and running the application.
/// It also provides a convenient way to override collaborators for testing
/// purposes.
pub struct AppBuilder {
    config: Config,
    flight_store_override: Option<Arc<dyn FlightStore>>,
    account_store_override: Option<Arc<dyn AccountStore>>,
    push_override: Option<Arc<dyn PushSender>>,
    email_override: Option<Arc<dyn EmailSender>>,
    sms_override: Option<Arc<dyn SmsSender>>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            flight_store_override: None,
            account_store_override: None,
            push_override: None,
            email_override: None,
            sms_override: None,
        }
    }

    /// Overrides the flight store for testing.
    pub fn flight_store_override(mut self, store: Arc<dyn FlightStore>) -> Self {
        self.flight_store_override = Some(store);
        self
    }

    /// Overrides the account store for testing.
    pub fn account_store_override(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.account_store_override = Some(store);
        self
    }

    /// Overrides the push sender for testing.
    pub fn push_override(mut self, sender: Arc<dyn PushSender>) -> Self {
        self.push_override = Some(sender);
        self
    }

    /// Overrides the email sender for testing.
    pub fn email_override(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.email_override = Some(sender);
        self
    }

    /// Overrides the SMS sender for testing.
    pub fn sms_override(mut self, sender: Arc<dyn SmsSender>) -> Self {
        self.sms_override = Some(sender);
        self
    }

    /// Builds and initializes all application components, returning a
    /// runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        // Channel senders: overrides for tests, HTTP clients otherwise.
        let push: Arc<dyn PushSender> = self.push_override.unwrap_or_else(|| {
            Arc::new(HttpPushClient::new(
                config.notification.push.endpoint.clone(),
                config.notification.push.api_key.clone(),
            ))
        });
        let email: Arc<dyn EmailSender> = self.email_override.unwrap_or_else(|| {
            Arc::new(HttpEmailClient::new(
                config.notification.email.endpoint.clone(),
                config.notification.email.api_key.clone(),
                config.notification.email.sender.clone(),
            ))
        });
        let sms: Arc<dyn SmsSender> = self.sms_override.unwrap_or_else(|| {
            Arc::new(HttpSmsClient::new(
                config.notification.sms.endpoint.clone(),
                config.notification.sms.api_key.clone(),
                config.notification.sms.from_number.clone(),
            ))
        });

        let dispatcher = Arc::new(
            Dispatcher::new(push, email, sms).with_send_timeout(Duration::from_secs(
                config.notification.send_timeout_seconds,
            )),
        );

        // Stores: a single in-memory document store backs both traits
        // unless the test substituted its own.
        let (flights, accounts) = match (self.flight_store_override, self.account_store_override) {
            (Some(flights), Some(accounts)) => (flights, accounts),
            (flights, accounts) => {
                let store = Arc::new(MemoryStore::new());
                (
                    flights.unwrap_or_else(|| store.clone() as Arc<dyn FlightStore>),
                    accounts.unwrap_or(store as Arc<dyn AccountStore>),
                )
            }
        };

        let hub = Arc::new(ConnectionHub::with_queue_capacity(
            config.hub.queue_capacity,
        ));
        let authenticator = Arc::new(Authenticator::new(
            &config.auth.token_secret,
            config.auth.token_ttl_minutes,
        ));
        let service = Arc::new(StatusService::new(
            flights,
            accounts,
            dispatcher,
            hub,
            authenticator,
        ));

        let listener = TcpListener::bind(&config.server.bind_addr).await?;
        let api_addr = listener.local_addr()?;
        info!(%api_addr, "API listener bound");
        handles.push((
            "ApiServer",
            tokio::spawn(server::serve(
                listener,
                AppState { service },
                shutdown_rx.clone(),
            )),
        ));

        let metrics_addr = if config.metrics.enabled {
            match install_recorder() {
                Ok(prom_handle) => {
                    let listener = TcpListener::bind(&config.metrics.bind_addr).await?;
                    let addr = listener.local_addr()?;
                    info!(metrics_addr = %addr, "metrics listener bound");
                    let metrics_server = MetricsServer::new(listener, prom_handle, shutdown_rx.clone());
                    handles.push(("MetricsServer", tokio::spawn(metrics_server.run())));
                    Some(addr)
                }
                Err(e) => {
                    warn!(error = %e, "metrics recorder already installed; exposition disabled");
                    None
                }
            }
        } else {
            None
        };

        Ok(App {
            handles,
            shutdown_rx,
            api_addr,
            metrics_addr,
        })
    }
}
