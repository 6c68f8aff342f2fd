//! Upstream error types.

use homelab_session::PollError;

/// Error raised talking to an upstream API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure or timeout.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The upstream answered 429.
    #[error("Upstream rate limited{}", .retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds from the `Retry-After` header, when present.
        retry_after: Option<u64>,
    },

    /// The response body did not have the expected shape.
    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    /// The upstream answered with a non-success HTTP status.
    #[error("Upstream API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The upstream answered 200 but refused the request (e.g. bad login).
    #[error("Upstream rejected request: {0}")]
    Rejected(String),

    /// A remote task did not finish within its poll ceiling.
    #[error("Remote task {task} did not finish after {attempts} polls")]
    PollTimeout {
        /// Remote task identifier.
        task: String,
        /// Number of polls made.
        attempts: u32,
    },
}

impl UpstreamError {
    /// Whether the upstream could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, UpstreamError::Unavailable(_))
    }

    /// Whether the upstream is throttling us.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    /// Whether a remote task hit its poll ceiling.
    pub fn is_poll_timeout(&self) -> bool {
        matches!(self, UpstreamError::PollTimeout { .. })
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return UpstreamError::Decode(e.to_string());
        }
        match e.status() {
            Some(status) if status.as_u16() == 429 => UpstreamError::RateLimited { retry_after: None },
            Some(status) => UpstreamError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => UpstreamError::Unavailable(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(e: serde_json::Error) -> Self {
        UpstreamError::Decode(e.to_string())
    }
}

impl From<PollError<UpstreamError>> for UpstreamError {
    fn from(e: PollError<UpstreamError>) -> Self {
        match e {
            PollError::Timeout { task, attempts } => UpstreamError::PollTimeout { task, attempts },
            PollError::Task(e) => e,
        }
    }
}

/// Result type for upstream calls.
pub type Result<T> = std::result::Result<T, UpstreamError>;
