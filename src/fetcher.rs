//! Fetch orchestrator - the cache-aside controller
//!
//! The sole entry point platform adapters use. Turns "fresh-or-cached data
//! for key K" into one call with a strict contract: at most one data-source
//! invocation per call, stale data is never silently returned, errors are
//! never cached.
//!
//! Concurrent misses on the same key are not deduplicated: each caller
//! independently invokes its data source and writes the cache, last write
//! wins. Adapter fetches are idempotent and converge on equivalent content,
//! so the race is benign; the warmup scheduler keeps miss storms off the
//! hot keys.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use crate::cache::{CacheKey, CacheManager, CacheStats};
use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::models::{PlatformMeta, Record, ResponseEnvelope};
use crate::pool::ObjectPools;
use crate::retry::RetryPolicy;

/// Data-fetching service coordinating cache and upstream access
pub struct Fetcher {
    cache: Arc<CacheManager>,
    http: Arc<HttpClient>,
    pools: Arc<ObjectPools>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        cache: Arc<CacheManager>,
        http: Arc<HttpClient>,
        pools: Arc<ObjectPools>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            http,
            pools,
            retry,
        }
    }

    /// Get feed data for a key, from cache or via the supplied data source.
    ///
    /// 1. A cache hit that deserializes is returned immediately with
    ///    `fromCache = true`; no network I/O happens on this path.
    /// 2. Corrupt cached bytes are logged and treated as a miss.
    /// 3. On a miss the data source runs once. Its error propagates with
    ///    platform context and is not cached.
    /// 4. A non-empty result is serialized and written through both tiers.
    ///    An empty result is returned but not cached, so one transient empty
    ///    upstream response cannot occupy the key for a full TTL.
    pub async fn get_data<F, Fut>(
        &self,
        key: &str,
        meta: &PlatformMeta,
        ttl: Duration,
        data_source: F,
    ) -> Result<ResponseEnvelope>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Record>>>,
    {
        let cache_key = CacheKey::new(key);

        if let Some(cached) = self.cache.get(&cache_key).await {
            match serde_json::from_slice::<Vec<Record>>(&cached) {
                Ok(records) => {
                    info!(
                        platform = %meta.name,
                        cache_key = key,
                        count = records.len(),
                        "cache hit"
                    );
                    return Ok(ResponseEnvelope::success(meta, records, true));
                }
                Err(err) => {
                    warn!(
                        cache_key = key,
                        error = %err,
                        "cached payload failed to deserialize, treating as miss"
                    );
                }
            }
        }

        info!(platform = %meta.name, cache_key = key, "cache miss, fetching from source");

        let records = data_source().await.map_err(|err| Error::DataSource {
            platform: meta.name.clone(),
            source: Box::new(err),
        })?;

        if !records.is_empty() {
            match serde_json::to_vec(&records) {
                Ok(encoded) => {
                    self.cache.set(&cache_key, Bytes::from(encoded), ttl).await;
                    info!(
                        platform = %meta.name,
                        cache_key = key,
                        count = records.len(),
                        "fetched data cached"
                    );
                }
                Err(err) => {
                    warn!(cache_key = key, error = %err, "failed to encode records for caching");
                }
            }
        }

        Ok(ResponseEnvelope::success(meta, records, false))
    }

    /// Administrative cache-busting hook for one key.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.cache.delete(&CacheKey::new(key)).await;
        Ok(())
    }

    /// Read-only cache stats for the status endpoint.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The shared HTTP client, for adapters.
    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// The shared object pools, for adapters.
    pub fn pools(&self) -> &Arc<ObjectPools> {
        &self.pools
    }

    /// The default retry policy, for adapters.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

// =============================================================================
// Tests
// =============================================================================
