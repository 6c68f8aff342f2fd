//! Redis-backed keyed store.

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, RedisError};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::{KeyedStore, ttl_seconds};

/// [`KeyedStore`] over a multiplexed Redis connection.
///
/// All keys are written under `prefix`, so several deployments can share
/// one Redis database. The connection is cloned per command; the
/// multiplexer pipelines concurrent calls over a single socket.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Open a connection to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str, prefix: impl Into<String>) -> StoreResult<Self> {
        let client = Client::open(url).map_err(|e| map_err("connect", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_err("connect", e))?;

        let prefix = prefix.into();
        info!(prefix = %prefix, "Connected to Redis");

        Ok(Self { conn, prefix })
    }

    /// Key prefix applied to every command.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

fn map_err(op: &'static str, e: RedisError) -> StoreError {
    StoreError::unavailable(op, e.to_string())
}

#[async_trait]
impl KeyedStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.prefixed(key))
            .await
            .map_err(|e| map_err("get", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.prefixed(key), value)
            .await
            .map_err(|e| map_err("set", e))?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = conn
            .expire(self.prefixed(key), ttl_seconds(ttl) as i64)
            .await
            .map_err(|e| map_err("expire", e))?;
        Ok(applied)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .del(self.prefixed(key))
            .await
            .map_err(|e| map_err("delete", e))?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let reply: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err("ping", e))?;
        debug!(reply = %reply, "Redis ping");
        Ok(())
    }

    /// Atomic `SET key value EX ttl`.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl(ttl));
        }
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.prefixed(key), value, ttl_seconds(ttl))
            .await
            .map_err(|e| map_err("set", e))?;
        Ok(())
    }
}
