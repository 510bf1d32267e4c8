//! Configuration management for FlightWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a `flightwatch.toml` file and merge it
//! with environment variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the public API server.
    pub server: ServerConfig,
    /// Configuration for token issuance.
    pub auth: AuthConfig,
    /// Configuration for the live observer hub.
    pub hub: HubConfig,
    /// Configuration for the notification channels.
    pub notification: NotificationConfig,
    /// Configuration for metrics exposition.
    pub metrics: MetricsConfig,
}

/// Configuration for the public API server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: String,
}

/// Configuration for token issuance.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens.
    pub token_secret: String,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
}

/// Configuration for the live observer hub.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HubConfig {
    /// Per-connection outbound queue capacity. A connection whose queue
    /// fills up counts as failed and is dropped from the registry.
    pub queue_capacity: usize,
}

/// Configuration for the notification channels.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    /// Bound on a single channel send, in seconds.
    pub send_timeout_seconds: u64,
    /// Push provider settings.
    pub push: PushConfig,
    /// Mail provider settings.
    pub email: EmailConfig,
    /// SMS provider settings.
    pub sms: SmsConfig,
}

/// Push provider settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    /// The push API's message endpoint.
    pub endpoint: String,
    /// Bearer credential for the API.
    pub api_key: String,
}

/// Mail provider settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    /// The mail API's message endpoint.
    pub endpoint: String,
    /// Bearer credential for the API.
    pub api_key: String,
    /// The `from` address stamped on every message.
    pub sender: String,
}

/// SMS provider settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsConfig {
    /// The messaging API's message-create endpoint.
    pub endpoint: String,
    /// Bearer credential for the API.
    pub api_key: String,
    /// The sending phone number.
    pub from_number: String,
}

/// Configuration for metrics exposition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Whether to expose Prometheus metrics at all.
    pub enabled: bool,
    /// Address the `/metrics` listener binds to.
    pub bind_addr: String,
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// the TOML file, environment variables, and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| "flightwatch.toml".into());
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables, e.g.
            // FLIGHTWATCH_LOG_LEVEL=debug
            .merge(Env::prefixed("FLIGHTWATCH_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                bind_addr: "127.0.0.1:8000".to_string(),
            },
            auth: AuthConfig {
                token_secret: "change-me".to_string(),
                token_ttl_minutes: 30,
            },
            hub: HubConfig { queue_capacity: 32 },
            notification: NotificationConfig {
                send_timeout_seconds: 10,
                push: PushConfig {
                    endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
                    api_key: String::new(),
                },
                email: EmailConfig {
                    endpoint: "https://api.mailprovider.example/v1/messages".to_string(),
                    api_key: String::new(),
                    sender: "alerts@flightwatch.dev".to_string(),
                },
                sms: SmsConfig {
                    endpoint: "https://api.smsprovider.example/v1/messages".to_string(),
                    api_key: String::new(),
                    from_number: String::new(),
                },
            },
            metrics: MetricsConfig {
                enabled: false,
                bind_addr: "127.0.0.1:9090".to_string(),
            },
        }
    }
}
