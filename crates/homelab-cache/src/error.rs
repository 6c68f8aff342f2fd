//! Error types for keyed store and cache-aside operations.

use std::time::Duration;

/// Error raised by a [`KeyedStore`](crate::KeyedStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached, or failed mid-command.
    #[error("Store unavailable during {op}: {message}")]
    Unavailable {
        /// Store operation that failed (`get`, `set`, ...).
        op: &'static str,
        /// Backend-specific failure description.
        message: String,
    },

    /// A write was attempted with a zero TTL.
    #[error("Invalid TTL {0:?}: entries must expire after a non-zero duration")]
    InvalidTtl(Duration),
}

impl StoreError {
    /// Shorthand for [`StoreError::Unavailable`].
    pub fn unavailable(op: &'static str, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            op,
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error returned by a cache-wrapped fetch.
///
/// Keeps "the cache is broken" ([`CacheError::Store`]) apart from
/// "the upstream is broken" ([`CacheError::Upstream`]) so callers can react
/// differently. Corrupt cache entries never surface here; they are discarded
/// and refetched.
#[derive(Debug, thiserror::Error)]
pub enum CacheError<E> {
    /// The keyed store failed.
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// The wrapped operation failed. Passed through unchanged.
    #[error(transparent)]
    Upstream(E),

    /// A fresh result could not be serialized for storage.
    #[error("Failed to encode value for caching: {0}")]
    Encode(#[source] serde_json::Error),
}

impl<E> CacheError<E> {
    /// Whether this error originated in the keyed store.
    pub fn is_store(&self) -> bool {
        matches!(self, CacheError::Store(_))
    }

    /// Whether this error originated in the wrapped operation.
    pub fn is_upstream(&self) -> bool {
        matches!(self, CacheError::Upstream(_))
    }

    /// Borrow the upstream error, if that is where this came from.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            CacheError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}
