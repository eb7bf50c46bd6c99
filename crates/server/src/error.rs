//! Structured errors for the proxy.
//!
//! Worker and network failures become HTTP statuses; the page sees a failed
//! request rather than a synthetic offline page.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ninja_cache_core::Error;

/// Structured errors for the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The incoming request could not be turned into an origin request.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// Network failed and no cached response was available.
    #[error("UPSTREAM_UNAVAILABLE: {0}")]
    Unavailable(String),

    /// Anything else (storage failures, malformed upstream responses).
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ProxyError {
    fn from(err: Error) -> Self {
        match &err {
            Error::CacheMiss(_) | Error::Network(_) => ProxyError::Unavailable(err.to_string()),
            Error::InvalidUrl(_) | Error::InvalidInput(_) => ProxyError::InvalidRequest(err.to_string()),
            _ => ProxyError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "request failed");
        (self.status(), self.to_string()).into_response()
    }
}
