//! L1 cache - bounded in-process tier
//!
//! The hot path for every read. Backed by a key-sharded map so concurrent
//! requests on different keys never share a lock. Bounded by entry count,
//! per-entry size and total bytes; when a bound is exceeded the oldest
//! entries are evicted first (expired ones unconditionally).
//!
//! L1 is assumed always available: an invalid configuration is a fatal
//! startup condition, unlike the networked L2 tier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::entry::{CacheEntry, CacheKey};
use super::shard::ShardedMap;
use crate::error::{Error, Result};

/// L1 cache configuration
#[derive(Debug, Clone)]
pub struct L1Config {
    /// Shard count (rounded up to a power of two)
    pub shards: usize,
    /// TTL applied when a write specifies none
    pub default_ttl: Duration,
    /// Interval between expired-entry purges
    pub cleanup_interval: Duration,
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum size of a single entry in bytes; larger writes are rejected
    pub max_entry_size: usize,
    /// Maximum total bytes across all entries
    pub max_total_bytes: u64,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            shards: 1024,
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(600),
            max_entries: 10_000,
            max_entry_size: 512 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
        }
    }
}

impl L1Config {
    /// Validate the bound knobs. A failure here is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(Error::CacheInit("L1 shard count must be positive".into()));
        }
        if self.max_entries == 0 {
            return Err(Error::CacheInit("L1 max_entries must be positive".into()));
        }
        if self.max_entry_size == 0 || self.max_total_bytes == 0 {
            return Err(Error::CacheInit("L1 size bounds must be positive".into()));
        }
        if self.max_entry_size as u64 > self.max_total_bytes {
            return Err(Error::CacheInit(
                "L1 max_entry_size exceeds max_total_bytes".into(),
            ));
        }
        Ok(())
    }
}

/// L1 cache - in-process hot tier
pub struct L1Cache {
    storage: ShardedMap,
    config: L1Config,
    current_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl L1Cache {
    /// Create an L1 cache; fails on an invalid configuration.
    pub fn new(config: L1Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage: ShardedMap::new(config.shards),
            config,
            current_size: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Get unexpired bytes for a key. Expired entries are removed on sight.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        match self.storage.get(key) {
            Some(entry) if entry.is_expired() => {
                if let Some(removed) = self.storage.remove(key) {
                    self.current_size.fetch_sub(removed.size(), Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.payload().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store bytes under a key. Returns false when the payload exceeds the
    /// per-entry bound; a zero TTL takes the configured default.
    pub fn set(&self, key: CacheKey, payload: Bytes, ttl: Duration) -> bool {
        if payload.len() > self.config.max_entry_size {
            debug!(
                key = %key,
                size = payload.len(),
                limit = self.config.max_entry_size,
                "payload exceeds L1 entry size bound, skipping tier"
            );
            return false;
        }

        let ttl = if ttl.is_zero() {
            self.config.default_ttl
        } else {
            ttl
        };
        let entry = CacheEntry::new(payload, ttl);
        let size = entry.size();

        if self.over_bounds(size) {
            self.evict(size);
        }

        match self.storage.insert(key, entry) {
            Some(old) => {
                let old_size = old.size();
                if size >= old_size {
                    self.current_size.fetch_add(size - old_size, Ordering::Relaxed);
                } else {
                    self.current_size.fetch_sub(old_size - size, Ordering::Relaxed);
                }
            }
            None => {
                self.current_size.fetch_add(size, Ordering::Relaxed);
            }
        }
        true
    }

    /// Remove a key
    pub fn remove(&self, key: &CacheKey) -> bool {
        match self.storage.remove(key) {
            Some(entry) => {
                self.current_size.fetch_sub(entry.size(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.storage.contains_key(key)
    }

    fn over_bounds(&self, incoming: u64) -> bool {
        self.storage.len() >= self.config.max_entries
            || self.current_size.load(Ordering::Relaxed) + incoming > self.config.max_total_bytes
    }

    /// Evict until the incoming entry fits: expired entries first, then
    /// oldest-written. Age-ordered eviction keeps the tier's behavior simple
    /// and predictable; the bound knobs, not the policy, are the interface.
    fn evict(&self, incoming: u64) {
        let freed = self.purge_expired();
        if freed > 0 {
            debug!(freed_bytes = freed, "purged expired L1 entries during eviction");
        }

        if !self.over_bounds(incoming) {
            return;
        }

        let mut candidates: Vec<(CacheKey, Duration, u64)> = Vec::new();
        for i in 0..self.storage.shard_count() {
            for (key, entry) in self.storage.shard(i).entries() {
                candidates.push((key, entry.age(), entry.size()));
            }
        }

        // Oldest first
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        for (key, _, size) in candidates {
            if !self.over_bounds(incoming) {
                break;
            }
            if self.storage.remove(&key).is_some() {
                self.current_size.fetch_sub(size, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop every expired entry, returning the freed bytes. Called by the
    /// background janitor on the configured cleanup interval.
    pub fn purge_expired(&self) -> u64 {
        let mut freed = 0u64;
        for i in 0..self.storage.shard_count() {
            freed += self.storage.shard(i).retain(|_, entry| !entry.is_expired());
        }
        self.current_size.fetch_sub(freed, Ordering::Relaxed);
        freed
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &L1Config {
        &self.config
    }

    pub fn clear(&self) {
        let freed = self.storage.clear();
        self.current_size.fetch_sub(freed, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Property Tests
// =============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The entry-count bound holds for any write sequence.
        #[test]
        fn bounds_hold_for_any_write_sequence(
            writes in prop::collection::vec(("[a-z]{1,8}", 1usize..48), 1..200)
        ) {
            let cache = L1Cache::new(L1Config {
                shards: 4,
                max_entries: 16,
                max_entry_size: 48,
                max_total_bytes: 4096,
                ..L1Config::default()
            }).unwrap();

            for (key, len) in writes {
                cache.set(CacheKey::new(key), Bytes::from(vec![0u8; len]), Duration::from_secs(60));
                prop_assert!(cache.len() <= 16);
                prop_assert!(cache.size_bytes() <= 4096);
            }
        }

        /// What goes in comes back byte-identical while unexpired.
        #[test]
        fn get_returns_written_bytes(data in prop::collection::vec(any::<u8>(), 0..48)) {
            let cache = L1Cache::new(L1Config {
                shards: 4,
                max_entry_size: 48,
                ..L1Config::default()
            }).unwrap();

            let key = CacheKey::new("roundtrip");
            cache.set(key.clone(), Bytes::from(data.clone()), Duration::from_secs(60));
            let got = cache.get(&key).unwrap();
            prop_assert_eq!(got.as_ref(), data.as_slice());
        }
    }
}
