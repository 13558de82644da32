//! Shared API types and the handlers that only log.

use axum::{
    body::Body,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Largest event body that is read for logging.
const EVENT_BODY_LIMIT: usize = 1024 * 1024;

/// Handler for `/record/voice/event` and `/play/recording/event`.
///
/// Call progress is only logged; the body is not interpreted. Every method is
/// acknowledged, only POST bodies are read.
pub async fn log_event_handler(method: Method, uri: Uri, body: Body) -> StatusCode {
    if method != Method::POST {
        return StatusCode::OK;
    }
    match axum::body::to_bytes(body, EVENT_BODY_LIMIT).await {
        Ok(event) => tracing::info!(
            path = %uri.path(),
            event = %String::from_utf8_lossy(&event),
            "call event"
        ),
        Err(e) => tracing::warn!(path = %uri.path(), "unable to read event body: {}", e),
    }
    StatusCode::OK
}
