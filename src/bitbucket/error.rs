//! Bitbucket API error types.
//!
//! Distinguishes transient from permanent failures so that callers subject to
//! the host's retry/backoff policy know which calls are worth repeating.
//! Trust lookups ignore the distinction and fail closed either way.

use std::fmt;
use thiserror::Error;

/// The kind of Bitbucket API error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Transient error - safe to retry with backoff.
    ///
    /// HTTP 5xx, HTTP 429, network timeouts.
    Transient,

    /// Permanent error - repeating the call will not help.
    ///
    /// Most 4xx: missing repository, revoked credentials, bad request.
    Permanent,
}

impl ApiErrorKind {
    /// Returns true if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ApiErrorKind::Transient)
    }
}

/// A Bitbucket API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// The HTTP status code, if the request got far enough to have one.
    pub status_code: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {code}): {}", kind_str(self.kind), self.message),
            None => write!(f, "{}: {}", kind_str(self.kind), self.message),
        }
    }
}

fn kind_str(kind: ApiErrorKind) -> &'static str {
    match kind {
        ApiErrorKind::Transient => "transient Bitbucket API error",
        ApiErrorKind::Permanent => "permanent Bitbucket API error",
    }
}

impl ApiError {
    /// Categorizes an HTTP status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = if status >= 500 || status == 429 {
            ApiErrorKind::Transient
        } else {
            ApiErrorKind::Permanent
        };
        ApiError {
            kind,
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a transport-level failure (connect errors, timeouts).
    pub fn transport(err: reqwest::Error) -> Self {
        ApiError {
            kind: ApiErrorKind::Transient,
            status_code: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            ApiError::from_status(503, "unavailable").kind,
            ApiErrorKind::Transient
        );
        assert_eq!(
            ApiError::from_status(429, "rate limited").kind,
            ApiErrorKind::Transient
        );
        assert!(ApiError::from_status(500, "oops").kind.is_retriable());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(
            ApiError::from_status(404, "not found").kind,
            ApiErrorKind::Permanent
        );
        assert_eq!(
            ApiError::from_status(401, "unauthorized").kind,
            ApiErrorKind::Permanent
        );
        assert!(!ApiError::from_status(403, "forbidden").kind.is_retriable());
    }
}
