//! Sink receiver - inbound events to stream appends
//!
//! A small HTTP server: each accepted event body is a JSON array of
//! base64-encoded field values (the same wire body the source engine
//! emits), appended to the stream via `XADD` with a server-generated id.

use crate::store::StreamStore;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

type SharedStore<S> = Arc<Mutex<S>>;

/// Response body for an accepted event
#[derive(Debug, Serialize)]
struct Appended {
    /// Server-assigned entry id
    id: String,
}

/// Build the receiver application over a store
pub fn router<S>(store: S) -> Router
where
    S: StreamStore + Send + 'static,
{
    Router::new()
        .route("/", post(append::<S>))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(Mutex::new(store)))
}

/// Accept one event and append its payload to the stream
async fn append<S>(
    State(store): State<SharedStore<S>>,
    Json(values): Json<Vec<String>>,
) -> Response
where
    S: StreamStore + Send + 'static,
{
    let mut fields = Vec::with_capacity(values.len());
    for value in &values {
        match BASE64.decode(value) {
            Ok(bytes) => fields.push(Bytes::from(bytes)),
            Err(e) => {
                warn!(error = %e, "Rejected event with undecodable field value");
                return (
                    StatusCode::BAD_REQUEST,
                    "field values must be base64-encoded strings",
                )
                    .into_response();
            }
        }
    }

    // XADD requires at least one field/value pair.
    if fields.is_empty() || fields.len() % 2 != 0 {
        warn!(values = fields.len(), "Rejected event with uneven field list");
        return (
            StatusCode::BAD_REQUEST,
            "payload must be a non-empty list of field/value pairs",
        )
            .into_response();
    }

    match store.lock().await.append(&fields).await {
        Ok(id) => {
            debug!(id = %id, values = fields.len(), "Event appended to stream");
            (StatusCode::ACCEPTED, Json(Appended { id })).into_response()
        }
        Err(e) => {
            error!(error = %e, "Cannot write to stream");
            (StatusCode::BAD_GATEWAY, "cannot write to stream").into_response()
        }
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
