//! Cache-aside wrapping of fetch operations.
//!
//! [`CacheAside`] turns any [`Fetch`] into a cached one:
//!
//! 1. derive the key from the namespace and the call arguments
//! 2. look it up; a stored entry that deserializes into the output type is
//!    returned without calling the wrapped operation
//! 3. an entry that fails to deserialize is deleted and treated as a miss
//! 4. on a miss the wrapped operation runs once; its error is passed through
//!    unchanged, its value is stored with the configured TTL and returned
//!
//! There is no per-key lock. Concurrent identical misses each run the wrapped
//! operation and the last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CachePolicy;
use crate::error::{CacheError, StoreResult};
use crate::key::{CacheKey, CallArgs};
use crate::store::SharedStore;

// ─────────────────────────────────────────────────────────────────────────────
// Fetch
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request handle passed to every fetch.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
}

impl RequestContext {
    /// Context with a fresh request id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }

    /// Correlation id for log lines.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// An async data-fetching operation with a serializable result.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Result type. Also the schema cached entries are validated against.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Error type of the operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run the operation.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        args: &CallArgs,
    ) -> Result<Self::Output, Self::Error>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    type Output = F::Output;
    type Error = F::Error;

    async fn fetch(
        &self,
        ctx: &RequestContext,
        args: &CallArgs,
    ) -> Result<Self::Output, Self::Error> {
        (**self).fetch(ctx, args).await
    }
}

/// A type-erased, shareable [`Fetch`].
pub type SharedFetch<T, E> = Arc<dyn Fetch<Output = T, Error = E>>;

/// [`Fetch`] built from an async closure. See [`fetch_fn`].
#[derive(Clone)]
pub struct FnFetch<F> {
    f: F,
}

/// Adapt an async closure into a [`Fetch`].
///
/// The closure receives owned copies of the context and arguments.
pub fn fetch_fn<F, Fut, T, E>(f: F) -> FnFetch<F>
where
    F: Fn(RequestContext, CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    FnFetch { f }
}

#[async_trait]
impl<F, Fut, T, E> Fetch for FnFetch<F>
where
    F: Fn(RequestContext, CallArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    async fn fetch(&self, ctx: &RequestContext, args: &CallArgs) -> Result<T, E> {
        (self.f)(ctx.clone(), args.clone()).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CacheAside
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a store lookup, before deciding whether to call through.
enum Lookup<T> {
    Hit(T),
    Miss,
    Corrupt(serde_json::Error),
}

/// Cache-aside wrapper for one key namespace.
#[derive(Clone)]
pub struct CacheAside {
    store: SharedStore,
    namespace: String,
    policy: CachePolicy,
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("store", &self.store.name())
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .finish()
    }
}

impl CacheAside {
    /// Cache entries under `namespace` for `ttl`.
    pub fn new(store: SharedStore, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self::with_policy(store, namespace, CachePolicy::new().with_ttl(ttl))
    }

    /// Cache entries under `namespace` according to `policy`.
    pub fn with_policy(
        store: SharedStore,
        namespace: impl Into<String>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            policy,
        }
    }

    /// Treat store failures during lookup as misses.
    pub fn degrade_on_read_error(mut self, enabled: bool) -> Self {
        self.policy.degrade_on_read_error = enabled;
        self
    }

    /// Key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entry TTL.
    pub fn ttl(&self) -> Duration {
        self.policy.ttl
    }

    /// Backing store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Key under which a call with `args` is cached.
    pub fn key(&self, args: &CallArgs) -> CacheKey {
        CacheKey::derive(&self.namespace, args)
    }

    /// Wrap `inner` so every call goes through this cache.
    pub fn wrap<F: Fetch>(self, inner: F) -> Cached<F> {
        Cached { aside: self, inner }
    }

    /// Drop the cached entry for `args`, if any.
    pub async fn invalidate(&self, args: &CallArgs) -> StoreResult<bool> {
        self.store.delete(self.key(args).as_str()).await
    }

    /// Return the cached value for `args`, or run `fetch` and cache its result.
    ///
    /// `fetch` is invoked at most once, and only when no schema-valid entry
    /// is stored.
    pub async fn get_or_fetch<T, E, Fut>(
        &self,
        ctx: &RequestContext,
        args: &CallArgs,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<T, CacheError<E>>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key(args);
        let request_id = ctx.request_id();

        match self.lookup::<T>(&key).await {
            Ok(Lookup::Hit(value)) => {
                debug!(request_id = %request_id, key = %key, "Cache hit");
                return Ok(value);
            }
            Ok(Lookup::Miss) => {
                debug!(request_id = %request_id, key = %key, "Cache miss");
            }
            Ok(Lookup::Corrupt(error)) => {
                warn!(
                    request_id = %request_id,
                    key = %key,
                    error = %error,
                    "Cached entry failed validation, discarding"
                );
                self.store.delete(key.as_str()).await?;
            }
            Err(error) if self.policy.degrade_on_read_error => {
                warn!(
                    request_id = %request_id,
                    key = %key,
                    error = %error,
                    "Cache lookup failed, treating as miss"
                );
            }
            Err(error) => return Err(CacheError::Store(error)),
        }

        let value = fetch().await.map_err(CacheError::Upstream)?;

        let bytes = serde_json::to_vec(&value).map_err(CacheError::Encode)?;
        self.store
            .set_with_ttl(key.as_str(), &bytes, self.policy.ttl)
            .await?;

        debug!(
            request_id = %request_id,
            key = %key,
            ttl_secs = self.policy.ttl.as_secs(),
            bytes = bytes.len(),
            "Cached fresh result"
        );

        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> StoreResult<Lookup<T>> {
        let Some(bytes) = self.store.get(key.as_str()).await? else {
            return Ok(Lookup::Miss);
        };
        Ok(match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Lookup::Hit(value),
            Err(error) => Lookup::Corrupt(error),
        })
    }
}

/// A [`Fetch`] whose results are cached. Created by [`CacheAside::wrap`].
#[derive(Clone, Debug)]
pub struct Cached<F> {
    aside: CacheAside,
    inner: F,
}

impl<F> Cached<F> {
    /// The cache this fetch goes through.
    pub fn aside(&self) -> &CacheAside {
        &self.aside
    }

    /// The wrapped fetch.
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetch> Fetch for Cached<F> {
    type Output = F::Output;
    type Error = CacheError<F::Error>;

    async fn fetch(
        &self,
        ctx: &RequestContext,
        args: &CallArgs,
    ) -> Result<Self::Output, Self::Error> {
        self.aside
            .get_or_fetch(ctx, args, || self.inner.fetch(ctx, args))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testing::CountingStore;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: String,
        count: i64,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("upstream down: {0}")]
    struct UpstreamDown(String);

    /// Fetch returning a fixed value and counting invocations.
    struct Fixed {
        value: Sample,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(value: &str, count: i64) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let fetch = Self {
                value: Sample {
                    value: value.to_string(),
                    count,
                },
                calls: Arc::clone(&calls),
            };
            (fetch, calls)
        }
    }

    #[async_trait]
    impl Fetch for Fixed {
        type Output = Sample;
        type Error = UpstreamDown;

        async fn fetch(&self, _ctx: &RequestContext, _args: &CallArgs) -> Result<Sample, UpstreamDown> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    fn aside(store: &Arc<CountingStore>) -> CacheAside {
        let shared: SharedStore = store.clone();
        CacheAside::new(shared, "test:key", Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(CountingStore::new());
        let (fetch, calls) = Fixed::new("test", 42);
        let cached = aside(&store).wrap(fetch);
        let ctx = RequestContext::new();

        let first = cached.fetch(&ctx, &CallArgs::new()).await.unwrap();
        assert_eq!(first.value, "test");
        assert_eq!(first.count, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.gets(), 1);
        assert_eq!(store.writes(), 1);

        let second = cached.fetch(&ctx, &CallArgs::new()).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second call must be a hit");
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_hit_short_circuits_wrapped_operation() {
        let store = Arc::new(CountingStore::new());
        let cache = aside(&store);
        let key = cache.key(&CallArgs::new());
        store
            .seed(key.as_str(), br#"{"value":"cached","count":123}"#)
            .await;

        let (fetch, calls) = Fixed::new("fresh", 999);
        let result = cache
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await
            .unwrap();

        assert_eq!(
            result,
            Sample {
                value: "cached".to_string(),
                count: 123
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.gets(), 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deleted_and_refetched() {
        let store = Arc::new(CountingStore::new());
        let cache = aside(&store);
        let key = cache.key(&CallArgs::new());
        store.seed(key.as_str(), br#"{"invalid":"data"}"#).await;

        let (fetch, calls) = Fixed::new("fresh", 42);
        let result = cache
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await
            .unwrap();

        assert_eq!(result.value, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.deletes(), 1);
        assert_eq!(store.writes(), 1);

        let stored = store.peek(key.as_str()).await.unwrap();
        let stored: Sample = serde_json::from_slice(&stored).unwrap();
        assert_eq!(stored.value, "fresh");
    }

    #[tokio::test]
    async fn test_non_json_entry_is_treated_as_corrupt() {
        let store = Arc::new(CountingStore::new());
        let cache = aside(&store);
        let key = cache.key(&CallArgs::new());
        store.seed(key.as_str(), b"\xff\xfe not json").await;

        let (fetch, calls) = Fixed::new("fresh", 1);
        let result = cache
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.deletes(), 1);
    }

    #[tokio::test]
    async fn test_entry_written_with_ttl() {
        let store = Arc::new(CountingStore::new());
        let cache = aside(&store);
        let key = cache.key(&CallArgs::new());

        let (fetch, _) = Fixed::new("test", 42);
        cache
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await
            .unwrap();

        let ttl = store.ttl(key.as_str()).expect("entry must carry a TTL");
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(55));
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through_and_nothing_is_stored() {
        let store = Arc::new(CountingStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let failing = fetch_fn(move |_ctx, _args| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Sample, _>(UpstreamDown("503".to_string()))
            }
        });

        let result = aside(&store)
            .wrap(failing)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await;

        let err = result.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(err.to_string(), "upstream down: 503");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_surfaces_as_store_error() {
        let store = Arc::new(CountingStore::new());
        store.set_reads_offline(true);

        let (fetch, calls) = Fixed::new("test", 42);
        let result = aside(&store)
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await;

        let err = result.unwrap_err();
        assert!(err.is_store());
        assert!(matches!(
            err,
            CacheError::Store(StoreError::Unavailable { op: "get", .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_degrades_when_configured() {
        let store = Arc::new(CountingStore::new());
        store.set_reads_offline(true);

        let (fetch, calls) = Fixed::new("test", 42);
        let result = aside(&store)
            .degrade_on_read_error(true)
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await
            .unwrap();

        assert_eq!(result.count, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_store_write_failure_is_not_swallowed() {
        let store = Arc::new(CountingStore::new());
        store.set_writes_offline(true);

        let (fetch, calls) = Fixed::new("test", 42);
        let result = aside(&store)
            .degrade_on_read_error(true)
            .wrap(fetch)
            .fetch(&RequestContext::new(), &CallArgs::new())
            .await;

        assert!(result.unwrap_err().is_store());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_arguments_use_distinct_entries() {
        let store = Arc::new(CountingStore::new());
        let cached = aside(&store).wrap(fetch_fn(|_ctx, args: CallArgs| async move {
            let id = args.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
            Ok::<_, UpstreamDown>(Sample {
                value: format!("item-{}", id),
                count: id,
            })
        }));
        let ctx = RequestContext::new();

        let one = cached.fetch(&ctx, &CallArgs::new().kwarg("id", 1)).await.unwrap();
        let two = cached.fetch(&ctx, &CallArgs::new().kwarg("id", 2)).await.unwrap();

        assert_eq!(one.value, "item-1");
        assert_eq!(two.value, "item-2");
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(CountingStore::new());
        let (fetch, calls) = Fixed::new("test", 42);
        let cached = aside(&store).wrap(fetch);
        let ctx = RequestContext::new();

        cached.fetch(&ctx, &CallArgs::new()).await.unwrap();
        assert!(cached.aside().invalidate(&CallArgs::new()).await.unwrap());
        cached.fetch(&ctx, &CallArgs::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_or_fetch_with_plain_closure() {
        let store = Arc::new(CountingStore::new());
        let cache = aside(&store);
        let ctx = RequestContext::new();
        let args = CallArgs::new().arg("test").kwarg("kwarg1", 20);

        let value: Sample = cache
            .get_or_fetch(&ctx, &args, || async {
                Ok::<_, UpstreamDown>(Sample {
                    value: "test".to_string(),
                    count: 20,
                })
            })
            .await
            .unwrap();

        assert_eq!(value.count, 20);
        let key = cache.key(&args);
        assert!(key.as_str().starts_with("test:key:"));
        assert!(key.as_str().contains("\"test\""));
        assert!(key.as_str().contains("20"));
        assert!(store.peek(key.as_str()).await.is_some());
    }
}
