//! HTTP handlers for the relay endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::relay::{EventSink, RelaySession};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
}

const FRAME_CHANNEL_CAPACITY: usize = 64;

/// `POST /invocations` - run one worker invocation and stream its output
/// back as Server-Sent Events.
pub async fn invoke(State(state): State<AppState>, body: Bytes) -> Response {
    // Syntactic gate only: the payload stays opaque and is forwarded
    // byte-for-byte to the worker; any schema belongs to the worker.
    if let Err(err) = serde_json::from_slice::<serde_json::Value>(&body) {
        tracing::warn!("rejecting unparseable request payload: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Invalid request payload",
                "details": err.to_string(),
            })),
        )
            .into_response();
    }

    let session_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let session = RelaySession::new(
        state.config.session_config(),
        body.to_vec(),
        EventSink::new(tx),
    );

    let span = tracing::info_span!("relay_session", %session_id);
    tokio::spawn(
        async move {
            let outcome = session.run().await;
            tracing::info!("session finished: {outcome:?}");
        }
        .instrument(span),
    );

    let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(frame.into_event()));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// `OPTIONS /invocations` - CORS preflight; headers come from the CORS
/// layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// `GET /` - service welcome document.
pub async fn welcome() -> Json<serde_json::Value> {
    Json(json!({
        "service": "MAGI Decision System",
        "description": "Relay bridging decision requests to agent worker processes",
        "endpoints": {
            "POST /invocations": "Run one worker invocation, streamed as SSE",
            "GET /health": "Health check",
            "GET /ping": "Liveness probe",
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "magi-relay",
        "workerCommand": state.config.worker_command,
        "processTimeoutMs": state.config.process_timeout_ms,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /ping` - minimal liveness probe for agent-runtime compatibility.
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
