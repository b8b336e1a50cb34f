//! Health check endpoint.

use axum::http::StatusCode;

/// Returns 200 if the server is running. Used for liveness probes.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
