//! L2 cache - shared networked tier
//!
//! A Redis-backed tier shared by every gateway instance. Larger and slower
//! than L1, reached over the network, and therefore optional: if it cannot
//! be reached at startup the cache degrades to L1-only operation.
//!
//! The backend is a trait so tests and single-node deployments can run
//! against an in-memory implementation. Every backend call is wrapped in the
//! tier's own operation timeout, distinct from any request deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{Error, Result};

/// Redis connection parameters for the L2 tier
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Whether the tier is enabled
    pub enabled: bool,
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Password, empty for none
    pub password: String,
    /// Database index (0-15)
    pub db: i64,
    /// Per-operation timeout
    pub timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

/// Storage backend for the L2 tier
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Get a value
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Set a value with a per-key TTL enforced by the store
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// Connectivity probe
    async fn ping(&self) -> Result<()>;
}

/// Redis backend over a multiplexed auto-reconnecting connection
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connect and verify the server responds within the configured timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())?;
        let connection = tokio::time::timeout(config.timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| Error::TierTimeout(config.timeout))??;

        let backend = Self { connection };
        tokio::time::timeout(config.timeout, backend.ping())
            .await
            .map_err(|_| Error::TierTimeout(config.timeout))??;
        Ok(backend)
    }
}

#[async_trait]
impl RemoteBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value.as_ref(), ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

/// In-memory backend for tests and single-node deployments
pub struct InMemoryRemoteBackend {
    data: DashMap<String, (Bytes, Instant, Duration)>,
}

impl InMemoryRemoteBackend {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for InMemoryRemoteBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteBackend for InMemoryRemoteBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        if let Some(entry) = self.data.get(key) {
            let (value, written_at, ttl) = entry.value();
            if written_at.elapsed() <= *ttl {
                return Ok(Some(value.clone()));
            }
        }
        // Expired entries are dropped lazily, like the real store.
        self.data
            .remove_if(key, |_, (_, written_at, ttl)| written_at.elapsed() > *ttl);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.data
            .insert(key.to_string(), (value, Instant::now(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// L2 cache - the networked tier with its own operation deadline
pub struct L2Cache {
    backend: Arc<dyn RemoteBackend>,
    op_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl L2Cache {
    pub fn new(backend: Arc<dyn RemoteBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Connect the Redis backend from configuration.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let backend = RedisBackend::connect(config).await?;
        Ok(Self::new(Arc::new(backend), config.timeout))
    }

    /// Get a value, bounded by the tier's operation timeout.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let result = tokio::time::timeout(self.op_timeout, self.backend.get(key))
            .await
            .map_err(|_| Error::TierTimeout(self.op_timeout))
            .and_then(|inner| inner);

        match &result {
            Ok(Some(_)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Set a value with a per-key TTL, bounded by the operation timeout.
    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let result = tokio::time::timeout(self.op_timeout, self.backend.set(key, value, ttl))
            .await
            .map_err(|_| Error::TierTimeout(self.op_timeout))
            .and_then(|inner| inner);
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Delete a value, bounded by the operation timeout.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let result = tokio::time::timeout(self.op_timeout, self.backend.delete(key))
            .await
            .map_err(|_| Error::TierTimeout(self.op_timeout))
            .and_then(|inner| inner);
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn in_memory_l2() -> L2Cache {
        L2Cache::new(
            Arc::new(InMemoryRemoteBackend::new()),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_redis_url_forms() {
        let config = RedisConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");

        let with_password = RedisConfig {
            password: "secret".to_string(),
            db: 3,
            ..RedisConfig::default()
        };
        assert_eq!(with_password.url(), "redis://:secret@localhost:6379/3");
    }

    #[tokio::test]
    async fn test_in_memory_set_get_delete() {
        let cache = in_memory_l2();

        cache
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().unwrap().as_ref(), b"v");
        assert_eq!(cache.hits(), 1);

        cache.delete("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_ttl_enforced_by_store() {
        let cache = in_memory_l2();

        cache
            .set("short", Bytes::from_static(b"v"), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        struct SlowBackend;

        #[async_trait]
        impl RemoteBackend for SlowBackend {
            async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
            async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            async fn delete(&self, _key: &str) -> Result<()> {
                Ok(())
            }
            async fn ping(&self) -> Result<()> {
                Ok(())
            }
        }

        let cache = L2Cache::new(Arc::new(SlowBackend), Duration::from_millis(20));

        let err = cache.get("k").await.unwrap_err();
        assert_matches!(err, Error::TierTimeout(_));

        let err = cache
            .set("k", Bytes::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_matches!(err, Error::TierTimeout(_));
        assert_eq!(cache.errors(), 2);
    }
}
