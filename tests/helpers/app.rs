#![allow(dead_code)]
//! Spawns a full application instance on an ephemeral port for tests.

use super::fakes::CountingSender;
use flightwatch::{app::App, config::Config};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A running application plus the fakes wired into it.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub push: CountingSender,
    pub email: CountingSender,
    pub sms: CountingSender,
    // Dropping this would shut the app down mid-test.
    _shutdown_tx: watch::Sender<bool>,
}

/// Builds and runs an app with fake senders and an in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_senders(
        CountingSender::new(),
        CountingSender::new(),
        CountingSender::new(),
    )
    .await
}

/// Like [`spawn_app`], but with caller-provided fakes (e.g. failing ones).
pub async fn spawn_app_with_senders(
    push: CountingSender,
    email: CountingSender,
    sms: CountingSender,
) -> TestApp {
    let mut config = Config::default();
    config.server.bind_addr = "127.0.0.1:0".to_string();
    config.auth.token_secret = "integration-test-secret".to_string();
    config.notification.send_timeout_seconds = 2;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config)
        .push_override(Arc::new(push.clone()))
        .email_override(Arc::new(email.clone()))
        .sms_override(Arc::new(sms.clone()))
        .build(shutdown_rx)
        .await
        .expect("failed to build test app");
    let addr = app.api_addr();
    tokio::spawn(app.run());

    TestApp {
        addr,
        client: reqwest::Client::new(),
        push,
        email,
        sms,
        _shutdown_tx: shutdown_tx,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Registers an account, asserting success.
    pub async fn register(&self, body: Value) {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&body)
            .send()
            .await
            .expect("register request failed");
        assert!(
            response.status().is_success(),
            "registration rejected: {}",
            response.status()
        );
    }

    /// Logs in and returns the bearer token.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request failed");
        assert!(response.status().is_success(), "login rejected");
        let body: Value = response.json().await.expect("login body was not JSON");
        body["access_token"]
            .as_str()
            .expect("no access_token in login response")
            .to_string()
    }

    /// Registers a default account and returns a token for it.
    pub async fn register_and_login(&self, username: &str, watchlist: &[&str]) -> String {
        self.register(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "secret1",
            "phone": "+15550002222",
            "watchlist": watchlist,
        }))
        .await;
        self.login(username, "secret1").await
    }

    /// Opens a live observer connection.
    pub async fn connect_observer(&self) -> WebSocketStream<MaybeTlsStream<TcpStream>> {
        let (stream, _response) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("WebSocket connect failed");
        stream
    }
}
