//! The handshake contract a stateful upstream implements.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Login/logout protocol of a session-based upstream.
///
/// `negotiate` runs first and its result is handed to both `authenticate`
/// and `deauthenticate`. Upstreams without a capability query use `()`.
#[async_trait]
pub trait SessionProtocol: Send + Sync + 'static {
    /// Negotiated protocol metadata, e.g. supported API versions.
    type Metadata: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Credential handed out by a successful login.
    type Session: Clone + Send + Sync + 'static;

    /// Error raised by any step of the protocol.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    /// Query protocol metadata.
    async fn negotiate(&self) -> Result<Self::Metadata, Self::Error>;

    /// Log in.
    async fn authenticate(&self, metadata: &Self::Metadata) -> Result<Self::Session, Self::Error>;

    /// Log out.
    async fn deauthenticate(
        &self,
        metadata: &Self::Metadata,
        session: &Self::Session,
    ) -> Result<(), Self::Error>;
}
