//! FlightWatch - Flight Status Notification Service
//!
//! Tracks flight status changes and notifies interested parties in real
//! time over a live WebSocket broadcast and three durable notification
//! channels (push, email, SMS).

use anyhow::Result;
use clap::Parser;
use flightwatch::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment,
    // and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        // Exit if configuration fails, as it's a critical step.
        std::process::exit(1);
    });

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("FlightWatch starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Bind Address: {}", config.server.bind_addr);
    info!("Token TTL: {}m", config.auth.token_ttl_minutes);
    info!("Hub Queue Capacity: {}", config.hub.queue_capacity);
    info!(
        "Channel Send Timeout: {}s",
        config.notification.send_timeout_seconds
    );
    info!("Push Endpoint: {}", config.notification.push.endpoint);
    info!("Email Endpoint: {}", config.notification.email.endpoint);
    info!("SMS Endpoint: {}", config.notification.sms.endpoint);
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            format!("Enabled ({})", config.metrics.bind_addr)
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Translate ctrl-c into the shutdown signal every task watches.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("ctrl-c received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    let app = App::builder(config).build(shutdown_rx).await?;
    app.run().await
}
