//! Instrumented store for tests.
//!
//! Enabled inside this crate's tests and, for downstream crates, through the
//! `testing` feature.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::store::KeyedStore;

/// A [`MemoryStore`] that counts calls and can be switched offline.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    reads_offline: AtomicBool,
    writes_offline: AtomicBool,
}

impl CountingStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put raw bytes in place without touching the counters.
    pub async fn seed(&self, key: &str, value: &[u8]) {
        // MemoryStore never fails.
        let _ = self.inner.set(key, value).await;
    }

    /// Read raw bytes without touching the counters.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await.ok().flatten()
    }

    /// Remaining TTL of `key` in the backing store.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.inner.ttl(key)
    }

    /// Number of `get` calls.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` / `set_with_ttl` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make `get` and `ping` fail with [`StoreError::Unavailable`].
    pub fn set_reads_offline(&self, offline: bool) {
        self.reads_offline.store(offline, Ordering::SeqCst);
    }

    /// Make every mutating call fail with [`StoreError::Unavailable`].
    pub fn set_writes_offline(&self, offline: bool) {
        self.writes_offline.store(offline, Ordering::SeqCst);
    }

    fn check_reads(&self, op: &'static str) -> StoreResult<()> {
        if self.reads_offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(op, "connection refused"));
        }
        Ok(())
    }

    fn check_writes(&self, op: &'static str) -> StoreResult<()> {
        if self.writes_offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(op, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_reads("get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_writes("set")?;
        self.inner.set(key, value).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.check_writes("expire")?;
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_writes("delete")?;
        self.inner.delete(key).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_reads("ping")
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_writes("set")?;
        self.inner.set_with_ttl(key, value, ttl).await
    }
}
