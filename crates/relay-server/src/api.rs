//! HTTP handlers: WebSocket upgrade, long-poll, send, health and metrics.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use metrics::{counter, histogram};
use relay_core::Identity;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::health::{self, HealthResponse};
use crate::mailbox::PublishOutcome;
use crate::metrics::{MAILBOX_PUBLISH_TOTAL, POLL_REQUESTS_TOTAL, POLL_WAIT_SECONDS};
use crate::server::AppState;
use crate::websocket::session::{self, SessionContext};

/// Query parameters of `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Identity the client connects as. Missing means the empty identity.
    #[serde(default)]
    pub username: String,
}

/// Body of `POST /send/{username}`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Text to park for the recipient.
    pub message: String,
}

/// Body of a `/poll` answer. `message` is empty on timeout.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    /// The consumed message, or `""`.
    pub message: String,
}

/// Body of a successful `/send`.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// Always `"Message sent"`.
    pub status: &'static str,
}

/// Client-facing request errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body was not a valid send request.
    #[error("Invalid request")]
    InvalidRequest(#[source] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// GET /ws?username=
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let identity = Identity::from_string(params.username);
    let ctx = SessionContext {
        registry: state.registry.clone(),
        router: state.router.clone(),
        shutdown: state.shutdown.token(),
        outbound_queue_capacity: state.config.outbound_queue_capacity,
        ping_interval: state.config.ping_interval(),
    };

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| session::run_ws_session(socket, identity, ctx))
}

/// GET /poll/{username}
pub async fn poll_handler(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Json<PollResponse> {
    let identity = Identity::from_string(username);
    let started = Instant::now();
    let shutdown = state.shutdown.token();

    let received = state
        .mailboxes
        .consume(&identity, state.config.poll_timeout(), &shutdown)
        .await;

    let result = if received.is_some() { "message" } else { "empty" };
    debug!(identity = %identity, result, "poll answered");
    counter!(POLL_REQUESTS_TOTAL, "result" => result).increment(1);
    histogram!(POLL_WAIT_SECONDS).record(started.elapsed().as_secs_f64());

    Json(PollResponse {
        message: received.unwrap_or_default(),
    })
}

/// POST /send/{username}
pub async fn send_handler(
    Path(username): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SendResponse>, ApiError> {
    let request: SendRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "rejecting send request");
        ApiError::InvalidRequest(e)
    })?;

    let identity = Identity::from_string(username);
    let outcome = state.mailboxes.publish(&identity, request.message);
    if outcome == PublishOutcome::Dropped {
        info!(identity = %identity, "mailbox full, message dropped");
    }
    counter!(MAILBOX_PUBLISH_TOTAL, "outcome" => outcome.as_str()).increment(1);

    Ok(Json(SendResponse {
        status: "Message sent",
    }))
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.mailboxes.slot_count(),
    ))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
