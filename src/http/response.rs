//! Terminal responses produced by the gate itself.
//!
//! Everything else a client sees comes from the handler.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Plain-text response with the given status.
pub fn text(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler failed or panicked.
pub fn internal_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Handler overran its deadline.
pub fn gateway_timeout() -> Response {
    text(StatusCode::GATEWAY_TIMEOUT, "Request handling timed out")
}

/// Scheduler stopped before the request was served.
pub fn service_unavailable() -> Response {
    text(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down")
}
