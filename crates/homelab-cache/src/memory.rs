//! Process-local keyed store with lazy TTL expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::store::KeyedStore;

/// A stored value and its optional deadline.
#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory [`KeyedStore`].
///
/// Expired entries are dropped when touched, and swept on every TTL write
/// so keys that are never read again do not pile up. Semantics follow Redis:
/// `set` clears any previous TTL, `expire` on a missing key returns `false`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .lock()
            .values()
            .filter(|slot| !slot.is_expired(now))
            .count()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of `key`. `None` if the key is absent or has no TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let slots = self.slots.lock();
        let slot = slots.get(key).filter(|slot| !slot.is_expired(now))?;
        slot.expires_at.map(|deadline| deadline.saturating_duration_since(now))
    }

}

#[async_trait]
impl KeyedStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(slot) if slot.is_expired(now) => {
                trace!(key = %key, "Entry expired, removing");
                slots.remove(key);
                Ok(None)
            }
            Some(slot) => Ok(Some(slot.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.slots.lock().insert(
            key.to_string(),
            Slot {
                value: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(slot) if !slot.is_expired(now) => {
                slot.expires_at = Some(now + ttl);
                Ok(true)
            }
            Some(_) => {
                slots.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .slots
            .lock()
            .remove(key)
            .is_some_and(|slot| !slot.is_expired(now)))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }
        let now = Instant::now();
        let mut slots = self.slots.lock();
        slots.retain(|_, slot| !slot.is_expired(now));
        slots.insert(
            key.to_string(),
            Slot {
                value: value.to_vec(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }
}
