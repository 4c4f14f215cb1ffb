//! Cache manager - unified two-tier cache
//!
//! Presents L1 (in-process) and L2 (Redis) as one logical cache with
//! read-through promotion and independent write-through population.
//!
//! # Failure semantics
//!
//! Cache writes are an optimization, not a correctness requirement: a tier
//! failing to store or delete a value is logged and swallowed, never
//! surfaced. An unreachable L2 at startup degrades the cache to L1-only with
//! a warning; an invalid L1 configuration is fatal.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::entry::CacheKey;
use super::l1::{L1Cache, L1Config};
use super::l2::{L2Cache, RedisConfig, RemoteBackend};
use super::metrics::{CacheMetrics, MetricsSnapshot};
use crate::error::Result;

/// Full cache-stats payload for the status endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Counter snapshot
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    /// Current L1 entry count
    pub l1_entries: usize,
    /// Current L1 payload bytes
    pub l1_size_bytes: u64,
    /// L1 evictions since startup
    pub l1_evictions: u64,
    /// Whether the networked tier is serving
    pub l2_enabled: bool,
}

/// Unified cache manager
pub struct CacheManager {
    l1: L1Cache,
    l2: Option<L2Cache>,
    metrics: Arc<CacheMetrics>,
}

impl CacheManager {
    /// Assemble a manager from an L1 tier and an optional L2 tier.
    pub fn new(l1_config: L1Config, l2: Option<L2Cache>) -> Result<Self> {
        Ok(Self {
            l1: L1Cache::new(l1_config)?,
            l2,
            metrics: Arc::new(CacheMetrics::new()),
        })
    }

    /// Initialize from configuration.
    ///
    /// L1 construction failure propagates (fatal). An enabled-but-unreachable
    /// L2 logs a warning and the cache runs L1-only.
    pub async fn init(l1_config: L1Config, redis_config: &RedisConfig) -> Result<Self> {
        let l2 = if redis_config.enabled {
            match L2Cache::connect(redis_config).await {
                Ok(cache) => {
                    info!(url = %redis_config.url(), "L2 cache (redis) connected");
                    Some(cache)
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        "L2 cache (redis) initialization failed, degrading to L1-only"
                    );
                    None
                }
            }
        } else {
            None
        };

        let manager = Self::new(l1_config, l2)?;
        info!(
            shards = manager.l1.config().shards,
            max_entries = manager.l1.config().max_entries,
            l2_enabled = manager.l2_enabled(),
            "cache manager initialized"
        );
        Ok(manager)
    }

    /// Construct a manager over a custom L2 backend (tests, single-node).
    pub fn with_backend(
        l1_config: L1Config,
        backend: Arc<dyn RemoteBackend>,
        op_timeout: Duration,
    ) -> Result<Self> {
        Self::new(l1_config, Some(L2Cache::new(backend, op_timeout)))
    }

    /// Get cached bytes for a key.
    ///
    /// L1 is the hot path and is consulted first; on an L1 miss the L2 tier
    /// is probed and a hit is promoted into L1 (best-effort copy) before
    /// returning. Tier errors are logged and read as misses.
    pub async fn get(&self, key: &CacheKey) -> Option<Bytes> {
        if let Some(data) = self.l1.get(key) {
            debug!(key = %key, "L1 cache hit");
            self.metrics.record_l1_hit();
            return Some(data);
        }
        self.metrics.record_l1_miss();

        let l2 = self.l2.as_ref()?;
        match l2.get(key.as_str()).await {
            Ok(Some(data)) => {
                debug!(key = %key, "L2 cache hit");
                self.metrics.record_l2_hit();

                // Promote into L1 with the tier's default TTL; the copy is
                // best-effort and an oversized payload simply stays L2-only.
                if self.l1.set(key.clone(), data.clone(), Duration::ZERO) {
                    self.metrics.record_promotion();
                }
                Some(data)
            }
            Ok(None) => {
                self.metrics.record_l2_miss();
                None
            }
            Err(err) => {
                warn!(key = %key, error = %err, "L2 cache read failed");
                self.metrics.record_l2_error();
                None
            }
        }
    }

    /// Write bytes through both tiers independently.
    ///
    /// A zero TTL takes the L1 default. Either tier failing is logged and
    /// swallowed; the other tier's write still proceeds.
    pub async fn set(&self, key: &CacheKey, value: Bytes, ttl: Duration) {
        let ttl = if ttl.is_zero() {
            self.l1.config().default_ttl
        } else {
            ttl
        };
        self.metrics.record_set();

        if self.l1.set(key.clone(), value.clone(), ttl) {
            debug!(key = %key, bytes = value.len(), "L1 cache write");
        } else {
            warn!(key = %key, bytes = value.len(), "L1 cache write rejected");
        }

        if let Some(l2) = &self.l2 {
            match l2.set(key.as_str(), value, ttl).await {
                Ok(()) => debug!(key = %key, "L2 cache write"),
                Err(err) => {
                    warn!(key = %key, error = %err, "L2 cache write failed");
                    self.metrics.record_l2_error();
                }
            }
        }
    }

    /// Delete a key from both tiers unconditionally.
    pub async fn delete(&self, key: &CacheKey) {
        self.metrics.record_delete();
        self.l1.remove(key);

        if let Some(l2) = &self.l2 {
            if let Err(err) = l2.delete(key.as_str()).await {
                warn!(key = %key, error = %err, "L2 cache delete failed");
                self.metrics.record_l2_error();
            }
        }
    }

    /// Whether the networked tier is serving.
    pub fn l2_enabled(&self) -> bool {
        self.l2.is_some()
    }

    /// Read-only stats snapshot for the status endpoint.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            counters: self.metrics.snapshot(),
            l1_entries: self.l1.len(),
            l1_size_bytes: self.l1.size_bytes(),
            l1_evictions: self.l1.evictions(),
            l2_enabled: self.l2_enabled(),
        }
    }

    /// Direct access to the L1 tier (promotion checks in tests)
    pub fn l1(&self) -> &L1Cache {
        &self.l1
    }

    /// Spawn the background janitor purging expired L1 entries.
    pub fn spawn_janitor(self: Arc<Self>) -> JoinHandle<()> {
        let manager = self;
        let interval = manager.l1.config().cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let freed = manager.l1.purge_expired();
                if freed > 0 {
                    debug!(freed_bytes = freed, "janitor purged expired L1 entries");
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::l2::InMemoryRemoteBackend;
    use crate::error::Error;
    use async_trait::async_trait;

    fn l1_only() -> CacheManager {
        CacheManager::new(L1Config::default(), None).unwrap()
    }

    fn two_tier() -> (CacheManager, Arc<InMemoryRemoteBackend>) {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let manager = CacheManager::with_backend(
            L1Config::default(),
            backend.clone(),
            Duration::from_secs(1),
        )
        .unwrap();
        (manager, backend)
    }

    /// Backend whose every operation fails
    struct BrokenBackend;

    #[async_trait]
    impl RemoteBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
            Err(Error::Internal("broken".into()))
        }
        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<()> {
            Err(Error::Internal("broken".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::Internal("broken".into()))
        }
        async fn ping(&self) -> Result<()> {
            Err(Error::Internal("broken".into()))
        }
    }

    #[tokio::test]
    async fn test_set_get_l1_only() {
        let manager = l1_only();
        let key = CacheKey::new("k");

        manager
            .set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
            .await;
        assert_eq!(manager.get(&key).await.unwrap().as_ref(), b"v");
        assert!(!manager.l2_enabled());
    }

    #[tokio::test]
    async fn test_set_populates_both_tiers() {
        let (manager, backend) = two_tier();
        let key = CacheKey::new("k");

        manager
            .set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
            .await;

        assert!(manager.l1().contains(&key));
        assert_eq!(backend.get("k").await.unwrap().unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn test_l2_hit_promotes_into_l1() {
        let (manager, backend) = two_tier();
        let key = CacheKey::new("promoted");

        // Seed only L2, as if another instance wrote it.
        backend
            .set("promoted", Bytes::from_static(b"shared"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!manager.l1().contains(&key));

        let data = manager.get(&key).await.unwrap();
        assert_eq!(data.as_ref(), b"shared");

        // Promotion happened: the next read is served from L1.
        assert!(manager.l1().contains(&key));
        let stats = manager.stats();
        assert_eq!(stats.counters.promotions, 1);
        assert_eq!(stats.counters.l2_hits, 1);

        manager.get(&key).await.unwrap();
        assert_eq!(manager.stats().counters.l1_hits, 1);
        assert_eq!(manager.stats().counters.l2_hits, 1, "second read must not touch L2");
    }

    #[tokio::test]
    async fn test_miss_in_both_tiers() {
        let (manager, _backend) = two_tier();
        assert!(manager.get(&CacheKey::new("absent")).await.is_none());

        let stats = manager.stats();
        assert_eq!(stats.counters.l1_misses, 1);
        assert_eq!(stats.counters.l2_misses, 1);
    }

    #[tokio::test]
    async fn test_broken_l2_reads_as_miss_and_writes_are_swallowed() {
        let manager = CacheManager::with_backend(
            L1Config::default(),
            Arc::new(BrokenBackend),
            Duration::from_secs(1),
        )
        .unwrap();
        let key = CacheKey::new("k");

        // Write succeeds overall despite the broken tier.
        manager
            .set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
            .await;

        // L1 still serves.
        assert_eq!(manager.get(&key).await.unwrap().as_ref(), b"v");

        // A key absent from L1 reads as a miss, not an error.
        assert!(manager.get(&CacheKey::new("other")).await.is_none());

        // Delete is swallowed too.
        manager.delete(&key).await;
        assert!(!manager.l1().contains(&key));
    }

    #[tokio::test]
    async fn test_delete_removes_from_both_tiers() {
        let (manager, backend) = two_tier();
        let key = CacheKey::new("k");

        manager
            .set(&key, Bytes::from_static(b"v"), Duration::from_secs(60))
            .await;
        manager.delete(&key).await;

        assert!(manager.get(&key).await.is_none());
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_takes_default() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let manager = CacheManager::with_backend(
            L1Config {
                default_ttl: Duration::from_millis(20),
                ..L1Config::default()
            },
            backend.clone(),
            Duration::from_secs(1),
        )
        .unwrap();
        let key = CacheKey::new("k");

        manager.set(&key, Bytes::from_static(b"v"), Duration::ZERO).await;
        assert!(manager.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.get(&key).await.is_none(), "default TTL applied to both tiers");
    }

    #[tokio::test]
    async fn test_degraded_init_is_not_fatal() {
        let config = RedisConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1, // nothing listens here
            timeout: Duration::from_millis(50),
            ..RedisConfig::default()
        };

        let manager = CacheManager::init(L1Config::default(), &config).await.unwrap();
        assert!(!manager.l2_enabled());

        // And the cache still works.
        let key = CacheKey::new("k");
        manager.set(&key, Bytes::from_static(b"v"), Duration::from_secs(5)).await;
        assert!(manager.get(&key).await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_l1_config_is_fatal() {
        let bad = L1Config {
            max_entries: 0,
            ..L1Config::default()
        };
        assert!(CacheManager::new(bad, None).is_err());
    }

    #[tokio::test]
    async fn test_stats_reflect_state() {
        let (manager, _backend) = two_tier();
        let key = CacheKey::new("k");

        manager.set(&key, Bytes::from_static(b"data"), Duration::from_secs(60)).await;
        manager.get(&key).await;

        let stats = manager.stats();
        assert_eq!(stats.l1_entries, 1);
        assert_eq!(stats.l1_size_bytes, 4);
        assert_eq!(stats.counters.l1_hits, 1);
        assert_eq!(stats.counters.sets, 1);
        assert!(stats.l2_enabled);
    }
}
