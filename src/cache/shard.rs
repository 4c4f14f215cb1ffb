//! Sharded concurrent map backing the L1 tier
//!
//! Keys are partitioned across independently locked regions so concurrent
//! reads and writes on different keys never contend. The shard count is a
//! configuration knob, rounded up to a power of two for mask-based routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::entry::{CacheEntry, CacheKey};

/// Single shard containing a hashmap and an entry counter
pub struct Shard {
    map: RwLock<HashMap<CacheKey, CacheEntry>>,
    count: AtomicU64,
}

impl Shard {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            count: AtomicU64::new(0),
        }
    }

    /// Number of entries in this shard
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone out a value
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.map.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.map.read().contains_key(key)
    }

    /// Insert a value, returning the old one if present
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheEntry> {
        let old = self.map.write().insert(key, entry);
        if old.is_none() {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        old
    }

    /// Remove a value, returning it if present
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.map.write().remove(key);
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove every entry matching the predicate, returning the freed bytes
    pub fn retain<F>(&self, mut keep: F) -> u64
    where
        F: FnMut(&CacheKey, &CacheEntry) -> bool,
    {
        let mut guard = self.map.write();
        let before = guard.len();
        let mut freed = 0u64;
        guard.retain(|k, v| {
            let keeping = keep(k, v);
            if !keeping {
                freed += v.size();
            }
            keeping
        });
        let removed = before - guard.len();
        self.count.fetch_sub(removed as u64, Ordering::Relaxed);
        freed
    }

    /// Snapshot this shard's entries (for eviction scans)
    pub fn entries(&self) -> Vec<(CacheKey, CacheEntry)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn clear(&self) -> u64 {
        let mut guard = self.map.write();
        let freed = guard.values().map(CacheEntry::size).sum();
        guard.clear();
        self.count.store(0, Ordering::Relaxed);
        freed
    }
}

/// Key-sharded map with a runtime-configured shard count
pub struct ShardedMap {
    shards: Vec<Shard>,
    mask: usize,
}

impl ShardedMap {
    /// Create a map with at least `shard_count` shards (rounded up to a
    /// power of two, minimum 1).
    pub fn new(shard_count: usize) -> Self {
        let count = shard_count.max(1).next_power_of_two();
        let shards = (0..count).map(|_| Shard::new()).collect();
        Self {
            shards,
            mask: count - 1,
        }
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_for(&self, key: &CacheKey) -> &Shard {
        &self.shards[key.shard_index(self.mask + 1)]
    }

    /// Get a reference to a specific shard
    #[inline]
    pub fn shard(&self, index: usize) -> &Shard {
        &self.shards[index & self.mask]
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.shard_for(key).get(key)
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.shard_for(key).contains_key(key)
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheEntry> {
        self.shards[key.shard_index(self.mask + 1)].insert(key, entry)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.shard_for(key).remove(key)
    }

    /// Total entries across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(Shard::is_empty)
    }

    /// Clear all shards, returning the freed bytes
    pub fn clear(&self) -> u64 {
        self.shards.iter().map(Shard::clear).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================
