//! Redis-backed store.
//!
//! Requires the `redis` feature. Entries are written as JSON text in the
//! [`CacheEntry::to_object`] form and parsed back on read, so expiry state
//! survives the round trip. Keys get a configurable prefix; `clear` and
//! `size` only look at keys under that prefix.

use async_trait::async_trait;
use idcloud_core::{CacheError, ConfigError, IdCloudResult, RedisConfig};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;

use super::{CacheStore, StoreOptions};
use crate::entry::CacheEntry;

/// Redis cache store. Connects lazily on first use.
pub struct RedisStore {
    client: Client,
    conn: OnceCell<MultiplexedConnection>,
    prefix: String,
    ttl: u64,
}

impl RedisStore {
    pub fn new(config: &RedisConfig, ttl: u64) -> IdCloudResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| ConfigError::InvalidValue {
            field: "cache.redis.url".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            prefix: config.prefix.clone(),
            ttl,
        })
    }

    pub fn from_options(options: &StoreOptions) -> IdCloudResult<Self> {
        let config = options.redis.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            field: "cache.redis".to_string(),
        })?;
        let mut store = Self::new(config, options.ttl)?;
        store.prefix = options.key_prefix(&config.prefix);
        Ok(store)
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn connection(&self) -> IdCloudResult<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| store_error("connect", e))
            })
            .await?;
        Ok(conn.clone())
    }

    async fn prefixed_keys(&self) -> IdCloudResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", self.prefix);
        conn.keys(&pattern)
            .await
            .map_err(|e| store_error("KEYS", e).into())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

fn store_error(op: &str, err: redis::RedisError) -> CacheError {
    CacheError::Store {
        store: "redis".to_string(),
        reason: format!("{} failed: {}", op, err),
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> IdCloudResult<Option<CacheEntry>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(self.prefixed_key(key))
            .await
            .map_err(|e| store_error("GET", e))?;
        match raw {
            Some(raw) => Ok(Some(CacheEntry::from_json_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> IdCloudResult<()> {
        let mut conn = self.connection().await?;
        let prefixed = self.prefixed_key(key);
        let raw = entry.to_json_string()?;
        if self.ttl > 0 {
            let _: () = conn
                .set_ex(&prefixed, raw, self.ttl)
                .await
                .map_err(|e| store_error("SETEX", e))?;
        } else {
            let _: () = conn
                .set(&prefixed, raw)
                .await
                .map_err(|e| store_error("SET", e))?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> IdCloudResult<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = conn
            .del(self.prefixed_key(key))
            .await
            .map_err(|e| store_error("DEL", e))?;
        Ok(deleted > 0)
    }

    async fn clear(&self) -> IdCloudResult<()> {
        let keys = self.prefixed_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(&keys).await.map_err(|e| store_error("DEL", e))?;
        Ok(())
    }

    async fn size(&self) -> IdCloudResult<usize> {
        Ok(self.prefixed_keys().await?.len())
    }
}
