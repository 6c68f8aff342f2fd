//! The keyed store contract.
//!
//! A keyed store is an external, shared key-value service with per-key TTL
//! (Redis in production). Homelab never assumes exclusive access to it: other
//! processes may read, overwrite or expire the same keys at any time, so every
//! write carries its own TTL instead of relying on prior state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Key-value store with TTL semantics.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Fetch the bytes stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key` with no expiry.
    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Attach a TTL to an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remove `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Round-trip check against the backend.
    async fn ping(&self) -> StoreResult<()>;

    /// Store `value` under `key` so that it expires after `ttl`.
    ///
    /// The default issues `set` then `expire`. If the `expire` step fails
    /// the key is deleted on a best-effort basis before the error is
    /// returned, so a write never silently leaves an immortal entry behind.
    /// Backends with an atomic set-with-expiry should override this.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }

        self.set(key, value).await?;

        match self.expire(key, ttl).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                // Another writer removed it first; nothing is left to outlive the TTL.
                debug!(key = %key, "Entry vanished between SET and EXPIRE");
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = self.delete(key).await {
                    warn!(
                        key = %key,
                        error = %cleanup,
                        "Failed to remove entry after EXPIRE failure"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Shared, dynamically dispatched store handle.
pub type SharedStore = Arc<dyn KeyedStore>;

/// Whole seconds for a TTL, rounded up so sub-second remainders never
/// shorten an entry's life to zero.
pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    let secs = if ttl.subsec_nanos() > 0 { secs + 1 } else { secs };
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use parking_lot::Mutex;

    #[derive(Clone, Copy)]
    enum ExpireBehavior {
        Apply,
        KeyGone,
        Fail,
    }

    /// Store relying on the default `set_with_ttl`.
    struct PlainStore {
        entries: Mutex<HashMap<String, Vec<u8>>>,
        expire: ExpireBehavior,
        fail_delete: bool,
        expired: Mutex<Vec<(String, Duration)>>,
    }

    impl PlainStore {
        fn new(expire: ExpireBehavior) -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                expire,
                fail_delete: false,
                expired: Mutex::new(Vec::new()),
            }
        }

        fn contains(&self, key: &str) -> bool {
            self.entries.lock().contains_key(key)
        }
    }

    #[async_trait]
    impl KeyedStore for PlainStore {
        fn name(&self) -> &'static str {
            "plain"
        }

        async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
            self.entries.lock().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
            match self.expire {
                ExpireBehavior::Apply => {
                    self.expired.lock().push((key.to_string(), ttl));
                    Ok(true)
                }
                ExpireBehavior::KeyGone => {
                    self.entries.lock().remove(key);
                    Ok(false)
                }
                ExpireBehavior::Fail => Err(StoreError::unavailable("expire", "broken pipe")),
            }
        }

        async fn delete(&self, key: &str) -> StoreResult<bool> {
            if self.fail_delete {
                return Err(StoreError::unavailable("delete", "broken pipe"));
            }
            Ok(self.entries.lock().remove(key).is_some())
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_set_with_ttl_sets_then_expires() {
        let store = PlainStore::new(ExpireBehavior::Apply);

        store
            .set_with_ttl("k", b"v", Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(
            *store.expired.lock(),
            vec![("k".to_string(), Duration::from_secs(30))]
        );
    }

    #[tokio::test]
    async fn test_default_set_with_ttl_removes_key_when_expire_fails() {
        let store = PlainStore::new(ExpireBehavior::Fail);

        let result = store.set_with_ttl("k", b"v", Duration::from_secs(30)).await;

        assert!(matches!(result, Err(StoreError::Unavailable { op: "expire", .. })));
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_default_set_with_ttl_reports_expire_error_over_cleanup_error() {
        let mut store = PlainStore::new(ExpireBehavior::Fail);
        store.fail_delete = true;

        let result = store.set_with_ttl("k", b"v", Duration::from_secs(30)).await;

        assert!(matches!(result, Err(StoreError::Unavailable { op: "expire", .. })));
    }

    #[tokio::test]
    async fn test_default_set_with_ttl_tolerates_vanished_key() {
        let store = PlainStore::new(ExpireBehavior::KeyGone);

        store
            .set_with_ttl("k", b"v", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn test_default_set_with_ttl_rejects_zero_ttl() {
        let store = PlainStore::new(ExpireBehavior::Apply);

        let result = store.set_with_ttl("k", b"v", Duration::ZERO).await;

        assert!(matches!(result, Err(StoreError::InvalidTtl(_))));
        assert!(!store.contains("k"));
    }

    #[test]
    fn test_ttl_seconds_rounds_up() {
        assert_eq!(ttl_seconds(Duration::from_secs(60)), 60);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_seconds(Duration::from_millis(10)), 1);
    }
}
