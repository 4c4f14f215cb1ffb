//! Cache key and entry types

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Cache key - an opaque string identifying one logical, parameterized query
/// (e.g. "hackernews_hot"). The same logical query always produces the same
/// key. The hash is precomputed once so shard routing never re-walks the
/// string.
#[derive(Clone, Debug, Eq)]
pub struct CacheKey {
    hash: u64,
    key: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let hash = fx_hash(key.as_bytes());
        Self { hash, key }
    }

    /// Get the shard index for this key (shard_count must be a power of two)
    #[inline]
    pub fn shard_index(&self, shard_count: usize) -> usize {
        (self.hash as usize) & (shard_count - 1)
    }

    /// The underlying key string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Precomputed hash
    #[inline]
    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

/// Fast non-cryptographic hash (FxHash algorithm)
#[inline]
fn fx_hash(bytes: &[u8]) -> u64 {
    const SEED: u64 = 0x517cc1b727220a95;
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: compare hashes first; fall through to the string for
        // collision resolution.
        self.hash == other.hash && self.key == other.key
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One cached payload with its freshness window.
///
/// Entries are owned exclusively by the tier that stores them; promotion
/// between tiers copies bytes rather than sharing a reference.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    payload: Bytes,
    written_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Create an entry written now
    pub fn new(payload: Bytes, ttl: Duration) -> Self {
        Self {
            payload,
            written_at: Instant::now(),
            ttl,
        }
    }

    /// The cached bytes
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Time elapsed since the entry was written
    #[inline]
    pub fn age(&self) -> Duration {
        self.written_at.elapsed()
    }

    /// Whether the entry's TTL has elapsed (a zero TTL never expires)
    #[inline]
    pub fn is_expired(&self) -> bool {
        !self.ttl.is_zero() && self.age() > self.ttl
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_query_same_key() {
        let a = CacheKey::new("weibo_hot");
        let b = CacheKey::new("weibo_hot");
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_eq!(a.shard_index(1024), b.shard_index(1024));
    }

    #[test]
    fn test_distinct_keys_differ() {
        let a = CacheKey::new("weibo_hot");
        let b = CacheKey::new("zhihu_hot");
        assert_ne!(a, b);
    }

    #[test]
    fn test_shard_index_in_range() {
        for i in 0..100 {
            let key = CacheKey::new(format!("platform-{}", i));
            assert!(key.shard_index(256) < 256);
        }
    }

    #[test]
    fn test_entry_not_expired_within_ttl() {
        let entry = CacheEntry::new(Bytes::from_static(b"data"), Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert_eq!(entry.size(), 4);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let entry = CacheEntry::new(Bytes::from_static(b"data"), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let entry = CacheEntry::new(Bytes::from_static(b"data"), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(10));
        assert!(!entry.is_expired());
    }
}
