//! Reusable object pools for transient allocations
//!
//! Two shapes dominate the per-request allocation profile: raw response byte
//! buffers and normalized record lists. Both are recycled through typed,
//! lock-free pools so steady-state traffic stops churning the allocator.
//!
//! # Contract
//!
//! - Acquired containers are logically empty (length zero) but keep their
//!   backing capacity; prior contents are unspecified and must not be read.
//! - Releasing an oversized container drops it instead of pooling it, so one
//!   anomalous response cannot bloat the pool's steady-state footprint.

use crossbeam::queue::ArrayQueue;

use crate::models::Record;

/// How many idle containers each pool retains.
const POOL_SLOTS: usize = 64;

/// Preallocated capacity of a response buffer (most API bodies fit in 256 KiB).
pub const BUFFER_PREALLOC: usize = 256 * 1024;

/// Buffers that grew beyond this are dropped on release.
pub const BUFFER_RECLAIM_LIMIT: usize = 512 * 1024;

/// Preallocated capacity of a record list (platforms return 30-100 items).
pub const RECORDS_PREALLOC: usize = 50;

/// Record lists that grew beyond this are dropped on release.
pub const RECORDS_RECLAIM_LIMIT: usize = 200;

/// A typed pool of reusable containers.
///
/// `make` builds a fresh container when the pool is empty; `reclaim` decides
/// whether a returned container is worth keeping.
pub struct Pool<T> {
    slots: ArrayQueue<T>,
    make: Box<dyn Fn() -> T + Send + Sync>,
    reclaim: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new(
        capacity: usize,
        make: impl Fn() -> T + Send + Sync + 'static,
        reclaim: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            slots: ArrayQueue::new(capacity),
            make: Box::new(make),
            reclaim: Box::new(reclaim),
        }
    }

    /// Pull a container from the pool, or build a fresh one if it is empty.
    pub fn acquire(&self) -> T {
        self.slots.pop().unwrap_or_else(|| (self.make)())
    }

    /// Return a container to the pool.
    ///
    /// Containers failing the reclaim guard are dropped. A full pool also
    /// drops the container rather than blocking.
    pub fn release(&self, item: T) {
        if (self.reclaim)(&item) {
            let _ = self.slots.push(item);
        }
    }

    /// Number of idle containers currently pooled.
    pub fn idle(&self) -> usize {
        self.slots.len()
    }
}

/// The gateway's two concrete pools, shared across all requests.
pub struct ObjectPools {
    buffers: Pool<Vec<u8>>,
    records: Pool<Vec<Record>>,
}

impl ObjectPools {
    pub fn new() -> Self {
        Self {
            buffers: Pool::new(
                POOL_SLOTS,
                || Vec::with_capacity(BUFFER_PREALLOC),
                |buf: &Vec<u8>| buf.capacity() <= BUFFER_RECLAIM_LIMIT,
            ),
            records: Pool::new(
                POOL_SLOTS,
                || Vec::with_capacity(RECORDS_PREALLOC),
                |list: &Vec<Record>| list.capacity() <= RECORDS_RECLAIM_LIMIT,
            ),
        }
    }

    /// Get an empty response buffer with its capacity preserved.
    pub fn acquire_buffer(&self) -> Vec<u8> {
        let mut buf = self.buffers.acquire();
        buf.clear();
        buf
    }

    /// Return a response buffer; oversized buffers are discarded.
    pub fn release_buffer(&self, buf: Vec<u8>) {
        self.buffers.release(buf);
    }

    /// Get an empty record list with its capacity preserved.
    pub fn acquire_record_list(&self) -> Vec<Record> {
        let mut list = self.records.acquire();
        list.clear();
        list
    }

    /// Return a record list; oversized lists are discarded.
    pub fn release_record_list(&self, list: Vec<Record>) {
        self.records.release(list);
    }

    /// Idle container counts, for the stats endpoint.
    pub fn idle_counts(&self) -> (usize, usize) {
        (self.buffers.idle(), self.records.idle())
    }
}

impl Default for ObjectPools {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
