//! Keyed response cache with cache-aside fetch wrapping.
//!
//! This crate provides the caching half of Homelab's data plane:
//! - [`KeyedStore`]: the get/set/expire/delete contract every backend meets
//! - [`MemoryStore`] and (with the `redis` feature) [`RedisStore`] backends
//! - [`CallArgs`] and [`CacheKey`]: deterministic keys from call signatures
//! - [`CacheAside`]: wraps any [`Fetch`] so a schema-valid stored entry
//!   short-circuits the call, and a corrupt one is discarded and refetched
//!
//! # Example
//!
//! ```rust,ignore
//! use homelab_cache::{CacheAside, CallArgs, MemoryStore, RequestContext, fetch_fn};
//!
//! let store = Arc::new(MemoryStore::new());
//! let cached = CacheAside::new(store, "github:stats", Duration::from_secs(300))
//!     .wrap(fetch_fn(|_ctx, args| async move { load_stats(args).await }));
//!
//! let stats = cached
//!     .fetch(&RequestContext::new(), &CallArgs::new().kwarg("user", "octocat"))
//!     .await?;
//! ```

mod aside;
mod config;
mod error;
mod key;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aside::{CacheAside, Cached, Fetch, FnFetch, RequestContext, SharedFetch, fetch_fn};
pub use config::{CachePolicy, DEFAULT_TTL};
pub use error::{CacheError, StoreError, StoreResult};
pub use key::{CacheKey, CallArgs};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store::{KeyedStore, SharedStore};
