//! Error types for session-wrapped calls.

use homelab_cache::CacheError;

/// Error returned by [`SessionScope::run`](crate::SessionScope::run).
///
/// Teardown failures never appear here; they are logged and the operation's
/// own outcome is returned.
#[derive(Debug, thiserror::Error)]
pub enum SessionError<E> {
    /// Capability negotiation failed, or its metadata cache did.
    #[error("Protocol negotiation failed: {0}")]
    Metadata(#[source] CacheError<E>),

    /// Login was refused or could not be attempted. No logout was issued.
    #[error("Authentication failed: {0}")]
    Auth(#[source] E),

    /// The operation run inside the session failed. Logout already ran.
    #[error(transparent)]
    Operation(E),
}

impl<E> SessionError<E> {
    /// Whether authentication was the step that failed.
    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }

    /// Whether the metadata cache store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, SessionError::Metadata(e) if e.is_store())
    }

    /// The upstream error behind this failure, if any.
    pub fn upstream(&self) -> Option<&E> {
        match self {
            SessionError::Metadata(e) => e.upstream(),
            SessionError::Auth(e) | SessionError::Operation(e) => Some(e),
        }
    }
}
