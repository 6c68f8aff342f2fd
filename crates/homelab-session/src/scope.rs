//! Scoped sessions with guaranteed logout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use homelab_cache::{CacheAside, CallArgs, Fetch, RequestContext, SharedStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::protocol::SessionProtocol;

/// Default lifetime of cached protocol metadata (one week).
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ============================================================================
// LiveSession
// ============================================================================

/// Everything an operation needs to talk to the upstream inside a session.
pub struct LiveSession<P: SessionProtocol> {
    protocol: Arc<P>,
    metadata: P::Metadata,
    session: P::Session,
    ctx: RequestContext,
}

impl<P: SessionProtocol> LiveSession<P> {
    /// The upstream protocol client.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Negotiated metadata.
    pub fn metadata(&self) -> &P::Metadata {
        &self.metadata
    }

    /// The session credential.
    pub fn session(&self) -> &P::Session {
        &self.session
    }

    /// Request context of the call that opened this session.
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }
}

impl<P: SessionProtocol> Clone for LiveSession<P> {
    fn clone(&self) -> Self {
        Self {
            protocol: Arc::clone(&self.protocol),
            metadata: self.metadata.clone(),
            session: self.session.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

// ============================================================================
// TeardownGuard
// ============================================================================

/// Owns a logged-in session until it is logged out.
///
/// [`release`](Self::release) logs out on a spawned task and waits for it, so
/// dropping the caller mid-logout does not interrupt it. A guard dropped
/// without being released spawns the logout in the background. Either way
/// the session is logged out at most once.
pub struct TeardownGuard<P: SessionProtocol> {
    protocol: Arc<P>,
    metadata: P::Metadata,
    session: Option<P::Session>,
}

impl<P: SessionProtocol> TeardownGuard<P> {
    /// Take ownership of a freshly authenticated session.
    pub fn new(protocol: Arc<P>, metadata: P::Metadata, session: P::Session) -> Self {
        Self {
            protocol,
            metadata,
            session: Some(session),
        }
    }

    /// The guarded session, until it has been handed to logout.
    pub fn session(&self) -> Option<&P::Session> {
        self.session.as_ref()
    }

    /// Log out and wait for the logout to finish.
    ///
    /// Logout failures are logged, never returned.
    pub async fn release(mut self) {
        let Some(task) = self.teardown() else {
            return;
        };
        if let Err(e) = task.await {
            warn!(
                protocol = self.protocol.name(),
                error = %e,
                "Logout task did not complete"
            );
        }
    }

    fn teardown(&mut self) -> Option<JoinHandle<()>> {
        let session = self.session.take()?;
        let protocol = Arc::clone(&self.protocol);
        let metadata = self.metadata.clone();

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    protocol = protocol.name(),
                    "No async runtime available, session was not logged out"
                );
                return None;
            }
        };

        Some(handle.spawn(async move {
            logout(protocol.as_ref(), &metadata, &session).await;
        }))
    }
}

impl<P: SessionProtocol> Drop for TeardownGuard<P> {
    fn drop(&mut self) {
        if self.session.is_some() {
            debug!(
                protocol = self.protocol.name(),
                "Session guard dropped before release, logging out in background"
            );
            let _ = self.teardown();
        }
    }
}

async fn logout<P: SessionProtocol>(protocol: &P, metadata: &P::Metadata, session: &P::Session) {
    match protocol.deauthenticate(metadata, session).await {
        Ok(()) => debug!(protocol = protocol.name(), "Logged out"),
        Err(e) => warn!(protocol = protocol.name(), error = %e, "Logout failed"),
    }
}

// ============================================================================
// SessionScope
// ============================================================================

/// Runs operations inside a login/logout bracket.
pub struct SessionScope<P: SessionProtocol> {
    protocol: Arc<P>,
    metadata_cache: Option<CacheAside>,
}

impl<P: SessionProtocol> Clone for SessionScope<P> {
    fn clone(&self) -> Self {
        Self {
            protocol: Arc::clone(&self.protocol),
            metadata_cache: self.metadata_cache.clone(),
        }
    }
}

impl<P: SessionProtocol> SessionScope<P> {
    /// Scope over `protocol`, negotiating metadata on every run.
    pub fn new(protocol: P) -> Self {
        Self::from_arc(Arc::new(protocol))
    }

    /// Scope over an already shared protocol client.
    pub fn from_arc(protocol: Arc<P>) -> Self {
        Self {
            protocol,
            metadata_cache: None,
        }
    }

    /// Cache negotiated metadata in `store` under `namespace` for `ttl`.
    pub fn with_metadata_cache(
        mut self,
        store: SharedStore,
        namespace: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        self.metadata_cache = Some(CacheAside::new(store, namespace, ttl));
        self
    }

    /// The protocol client.
    pub fn protocol(&self) -> &Arc<P> {
        &self.protocol
    }

    /// Negotiated metadata, from the cache when one is configured.
    pub async fn metadata(
        &self,
        ctx: &RequestContext,
    ) -> Result<P::Metadata, SessionError<P::Error>> {
        match &self.metadata_cache {
            Some(cache) => cache
                .get_or_fetch(ctx, &CallArgs::new(), || self.protocol.negotiate())
                .await
                .map_err(SessionError::Metadata),
            None => self
                .protocol
                .negotiate()
                .await
                .map_err(|e| SessionError::Metadata(homelab_cache::CacheError::Upstream(e))),
        }
    }

    /// Log in, run `op`, log out.
    ///
    /// Logout runs exactly once whenever login succeeded: after `op` returns,
    /// or in the background if this future is dropped first. A failed logout
    /// is logged and does not change the returned result.
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        op: F,
    ) -> Result<T, SessionError<P::Error>>
    where
        F: FnOnce(LiveSession<P>) -> Fut,
        Fut: Future<Output = Result<T, P::Error>>,
    {
        let metadata = self.metadata(ctx).await?;

        let session = self
            .protocol
            .authenticate(&metadata)
            .await
            .map_err(SessionError::Auth)?;
        debug!(
            request_id = %ctx.request_id(),
            protocol = self.protocol.name(),
            "Session opened"
        );

        let guard = TeardownGuard::new(Arc::clone(&self.protocol), metadata.clone(), session.clone());
        let live = LiveSession {
            protocol: Arc::clone(&self.protocol),
            metadata,
            session,
            ctx: ctx.clone(),
        };

        let result = op(live).await;
        if let Err(e) = &result {
            debug!(
                request_id = %ctx.request_id(),
                protocol = self.protocol.name(),
                error = %e,
                "Session operation failed"
            );
        }

        guard.release().await;
        result.map_err(SessionError::Operation)
    }
}

// ============================================================================
// Fetch adapter
// ============================================================================

/// [`Fetch`] that runs an operation inside a session. See [`session_fetch`].
pub struct SessionFetch<P: SessionProtocol, Op> {
    scope: SessionScope<P>,
    op: Op,
}

/// Adapt `scope` plus `op` into a [`Fetch`].
///
/// Wrapping the result in a [`CacheAside`] means a cache hit never opens a
/// session.
pub fn session_fetch<P, Op, Fut, T>(scope: SessionScope<P>, op: Op) -> SessionFetch<P, Op>
where
    P: SessionProtocol,
    Op: Fn(LiveSession<P>, CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, P::Error>> + Send + 'static,
{
    SessionFetch { scope, op }
}

#[async_trait]
impl<P, Op, Fut, T> Fetch for SessionFetch<P, Op>
where
    P: SessionProtocol,
    Op: Fn(LiveSession<P>, CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, P::Error>> + Send + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Output = T;
    type Error = SessionError<P::Error>;

    async fn fetch(&self, ctx: &RequestContext, args: &CallArgs) -> Result<T, Self::Error> {
        let args = args.clone();
        self.scope.run(ctx, |live| (self.op)(live, args)).await
    }
}
