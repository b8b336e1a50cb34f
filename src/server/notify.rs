//! The webhook notify endpoint.
//!
//! `POST /bitbucket-scmsource-hook/notify` receives Bitbucket webhook
//! deliveries, classifies them, normalizes the payload, and dispatches to the
//! registered processor.
//!
//! # Response policy
//!
//! - 200 OK on successful dispatch, and also when the payload could not be
//!   normalized: Bitbucket retries failed deliveries, and a payload this
//!   service cannot parse today will not parse on redelivery either.
//! - 400 Bad Request when the event-type header is missing or carries an
//!   unknown token. Unknown tokens are expected over the life of the
//!   integration and logged at info, not as errors.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::AppState;
use crate::hooks::{classify, dispatch, normalize, ClassifyError, ProcessContext};

/// Header carrying the event type token.
const HEADER_EVENT_KEY: &str = "x-event-key";
/// Optional header naming the hosting flavor.
const HEADER_BITBUCKET_TYPE: &str = "x-bitbucket-type";

/// Query parameters of the notify endpoint.
#[derive(Debug, Deserialize)]
pub struct NotifyParams {
    /// Bitbucket Server appends its own base URL; presence implies the
    /// server flavor when the type header is absent.
    pub server_url: Option<String>,
}

/// Errors that produce a non-200 response from the notify endpoint.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        match &self {
            NotifyError::Classify(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }
}

/// Notify handler.
///
/// # Request
///
/// - Method: POST
/// - Required header `X-Event-Key`: event type token (e.g. "repo:push")
/// - Optional header `X-Bitbucket-Type`: "cloud" or "server"
/// - Optional query parameter `server_url`
/// - Body: JSON webhook payload, flavor- and event-specific shape
pub async fn notify_handler(
    State(app_state): State<AppState>,
    Query(params): Query<NotifyParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), NotifyError> {
    let event_key = header_value(&headers, HEADER_EVENT_KEY);
    let flavor_header = header_value(&headers, HEADER_BITBUCKET_TYPE);

    let classification = classify(
        event_key.as_deref(),
        flavor_header.as_deref(),
        params.server_url.as_deref(),
    )
    .map_err(|e| {
        match &e {
            // Unknown tokens are business as usual, not a fault.
            ClassifyError::UnsupportedEvent(key) => {
                info!(event_key = %key, "received unknown Bitbucket hook, skipping");
            }
            ClassifyError::MissingHeader(name) => {
                debug!(header = name, "webhook without event-type header");
            }
        }
        e
    })?;

    debug!(
        event_type = %classification.event_type,
        flavor = %classification.flavor,
        "received webhook"
    );

    let event = match normalize(&body, classification.event_type, classification.flavor) {
        Ok(event) => event,
        Err(e) => {
            // A malformed payload must never take down the listener; ack
            // without triggering re-indexing.
            error!(
                event_type = %classification.event_type,
                flavor = %classification.flavor,
                error = %e,
                "cannot read hook payload"
            );
            return Ok((StatusCode::OK, "OK"));
        }
    };

    let origin = request_origin(&headers);
    let ctx = ProcessContext {
        flavor: classification.flavor,
        origin: &origin,
        server_url: params.server_url.as_deref(),
    };
    dispatch(
        app_state.processors().processor_for(classification.event_type),
        &event,
        &ctx,
    );

    Ok((StatusCode::OK, "OK"))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Describes where the event came from, for the host's audit trail.
fn request_origin(headers: &HeaderMap) -> String {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .unwrap_or_else(|| "webhook".to_string())
}
