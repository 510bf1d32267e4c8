//! The HTTP and WebSocket surface of the service.
//!
//! This module wires the public operation surface onto `axum`: account
//! registration and login, the bearer-protected flight status operations,
//! and the `/ws` observer transport. It also owns the mapping from the
//! error taxonomy to HTTP statuses.
//!
//! The server is designed for graceful shutdown, listening to a signal
//! from the main application to stop serving requests and terminate
//! cleanly.

use crate::core::FlightStatusEvent;
use crate::hub::{ConnectionHandle, ConnectionHub};
use crate::service::{RegisterRequest, ServiceError, StatusService};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator behind the whole API surface.
    pub service: Arc<StatusService>,
}

/// An API-layer error: a [`ServiceError`] plus its HTTP rendering.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Duplicate(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
        }
        let body = json!({
            "error": self.0.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

/// Login credentials.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/status", post(update_status))
        .route("/status/{flight_id}", get(get_status))
        .route("/flights", get(list_flights))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Serves the API until the shutdown signal fires.
pub async fn serve(listener: TcpListener, state: AppState, mut shutdown_rx: watch::Receiver<bool>) {
    let app = router(state);
    let shutdown = async move {
        shutdown_rx.changed().await.ok();
        debug!("API server received shutdown signal");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "API server error");
    }
    debug!("API server task finished");
}

/// Extracts the bearer token from an `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()).into())
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user registered successfully" })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .service
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<FlightStatusEvent>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.authorize(bearer_token(&headers)?)?;
    let record = state.service.update_status(event).await?;
    Ok(Json(record))
}

async fn get_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(flight_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.authorize(bearer_token(&headers)?)?;
    let record = state.service.get_status(&flight_id).await?;
    Ok(Json(record))
}

async fn list_flights(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.service.authorize(bearer_token(&headers)?)?;
    let records = state.service.list_flights().await?;
    Ok(Json(records))
}

/// Upgrades `GET /ws` to the observer transport.
///
/// The hub performs no authentication by contract; the connection is
/// registered as soon as the transport-level handshake completes.
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.service.hub();
    ws.on_upgrade(move |socket| handle_observer(socket, hub))
}

/// Drives one observer connection: forward broadcasts out, watch the
/// inbound side for close. The hub handle is released on every exit path.
async fn handle_observer(mut socket: WebSocket, hub: Arc<ConnectionHub>) {
    let mut handle: ConnectionHandle = hub.connect().await;
    let conn_id = handle.id();
    info!(conn_id, "observer connection open");

    loop {
        tokio::select! {
            outbound = handle.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            debug!(conn_id, "observer write failed, closing");
                            break;
                        }
                    }
                    // The hub removed us (or shut down); close the socket.
                    None => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(conn_id, "observer closed the connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(conn_id, error = %e, "observer transport error");
                        break;
                    }
                    // Inbound text/binary from observers is ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.disconnect(conn_id).await;
    info!(conn_id, "observer connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parses_well_formed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_rejects_missing_or_malformed_header() {
        assert!(bearer_token(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn service_errors_map_to_expected_statuses() {
        let cases = [
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Duplicate("alice".into()), StatusCode::CONFLICT),
            (ServiceError::NotFound("XX000".into()), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
