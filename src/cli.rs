//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using
//! the `clap` crate. These arguments are parsed at startup and then merged
//! with the configuration from the `flightwatch.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// A flight status tracker with live broadcast and multi-channel notifications.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the HTTP/WebSocket listener, e.g. 0.0.0.0:8000.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Timeout for a single notification channel send, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub send_timeout: Option<u64>,

    /// Enable the Prometheus metrics listener.
    #[arg(long)]
    pub metrics: Option<bool>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(bind) = &self.bind {
            dict.insert("server.bind_addr".into(), Value::from(bind.clone()));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.send_timeout {
            dict.insert(
                "notification.send_timeout_seconds".into(),
                Value::from(timeout),
            );
        }

        // The `metrics` flag is special. If it's present, it's true.
        // We use `Option<bool>` and check `is_some()` to differentiate
        // between "not present" and an explicit `--metrics=false`.
        if self.metrics.is_some() {
            dict.insert("metrics.enabled".into(), Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
