//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use homelab_cache::{CacheError, StoreError};
use homelab_session::SessionError;
use homelab_upstream::UpstreamError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The response cache store is unreachable.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Login to an upstream failed.
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    /// An upstream is throttling us.
    #[error("Upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// An upstream task did not finish in time.
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// Any other upstream failure.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The requested integration has no config section.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UpstreamError> for ServerError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::RateLimited { .. } => ServerError::UpstreamRateLimited(e.to_string()),
            UpstreamError::PollTimeout { .. } => ServerError::UpstreamTimeout(e.to_string()),
            _ => ServerError::Upstream(e.to_string()),
        }
    }
}

impl From<SessionError<UpstreamError>> for ServerError {
    fn from(e: SessionError<UpstreamError>) -> Self {
        match e {
            SessionError::Metadata(e) => e.into(),
            SessionError::Auth(e) if e.is_rate_limited() => {
                ServerError::UpstreamRateLimited(e.to_string())
            }
            SessionError::Auth(e) => ServerError::UpstreamAuth(e.to_string()),
            SessionError::Operation(e) => e.into(),
        }
    }
}

impl<E> From<CacheError<E>> for ServerError
where
    E: Into<ServerError>,
{
    fn from(e: CacheError<E>) -> Self {
        match e {
            CacheError::Store(e @ StoreError::InvalidTtl(_)) => ServerError::Config(e.to_string()),
            CacheError::Store(e) => ServerError::CacheUnavailable(e.to_string()),
            CacheError::Upstream(e) => e.into(),
            CacheError::Encode(e) => ServerError::Internal(format!("Failed to cache result: {}", e)),
        }
    }
}

impl From<homelab_config::ConfigError> for ServerError {
    fn from(e: homelab_config::ConfigError) -> Self {
        ServerError::Config(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    /// HTTP status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::CacheUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable"),
            ServerError::UpstreamAuth(_) => (StatusCode::BAD_GATEWAY, "upstream_auth_failed"),
            ServerError::UpstreamRateLimited(_) => {
                (StatusCode::TOO_MANY_REQUESTS, "upstream_rate_limited")
            }
            ServerError::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ServerError::NotConfigured(_) => (StatusCode::NOT_FOUND, "not_configured"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        match &self {
            ServerError::Internal(_) | ServerError::Config(_) | ServerError::CacheUnavailable(_) => {
                tracing::error!(status = %status, code, error = %message, "Server error");
            }
            _ => {
                tracing::warn!(status = %status, code, error = %message, "Request failed");
            }
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Wrapped = CacheError<SessionError<UpstreamError>>;

    fn status(e: impl Into<ServerError>) -> (StatusCode, &'static str) {
        e.into().status_and_code()
    }

    #[test]
    fn test_store_failure_is_503() {
        let e: Wrapped = CacheError::Store(StoreError::unavailable("get", "refused"));
        assert_eq!(status(e), (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable"));
    }

    #[test]
    fn test_metadata_store_failure_is_503() {
        let e: Wrapped = CacheError::Upstream(SessionError::Metadata(CacheError::Store(
            StoreError::unavailable("set", "refused"),
        )));
        assert_eq!(status(e), (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable"));
    }

    #[test]
    fn test_invalid_ttl_is_config_error() {
        let e: Wrapped = CacheError::Store(StoreError::InvalidTtl(Duration::ZERO));
        assert_eq!(
            status(e),
            (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
        );

        let e: Wrapped = CacheError::Upstream(SessionError::Metadata(CacheError::Store(
            StoreError::InvalidTtl(Duration::ZERO),
        )));
        assert_eq!(
            status(e),
            (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
        );
    }

    #[test]
    fn test_auth_failure_is_502() {
        let e: Wrapped = CacheError::Upstream(SessionError::Auth(UpstreamError::Rejected(
            "bad password".to_string(),
        )));
        assert_eq!(status(e), (StatusCode::BAD_GATEWAY, "upstream_auth_failed"));
    }

    #[test]
    fn test_rate_limit_is_429() {
        let e: Wrapped = CacheError::Upstream(SessionError::Operation(
            UpstreamError::RateLimited { retry_after: None },
        ));
        assert_eq!(status(e), (StatusCode::TOO_MANY_REQUESTS, "upstream_rate_limited"));
    }

    #[test]
    fn test_poll_timeout_is_504() {
        let e: Wrapped = CacheError::Upstream(SessionError::Operation(UpstreamError::PollTimeout {
            task: "FileStation_0001".to_string(),
            attempts: 20,
        }));
        assert_eq!(status(e), (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"));
    }

    #[test]
    fn test_other_upstream_is_502() {
        let e: Wrapped = CacheError::Upstream(SessionError::Operation(
            UpstreamError::Unavailable("connection refused".to_string()),
        ));
        assert_eq!(status(e), (StatusCode::BAD_GATEWAY, "upstream_error"));
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ServerError::NotConfigured("nas".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.code, "not_configured");
        assert_eq!(body.message, "Not configured: nas");
    }
}
