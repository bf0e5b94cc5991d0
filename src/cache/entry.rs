//! Cache Entry Module
//!
//! Defines the structure for individual cache entries. An entry is pure data:
//! value, wall-clock timestamps for TTL and a logical access ordinal for LRU.
//! Whether an entry is stale is decided by the expiration policy, not by the
//! entry itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::lru::Recency;

// == Cache Entry ==
/// A single cache entry: stored value and metadata.
///
/// Creation and expiry timestamps are Unix milliseconds. `last_accessed` is
/// an ordinal on the owning store's access clock, atomic so a read hit can
/// refresh recency without exclusive access to the entries map.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    value: V,
    /// Creation timestamp (Unix milliseconds)
    created_at: u64,
    /// Expiration timestamp (Unix milliseconds); None = no expiration
    expires_at: Option<u64>,
    /// Ordinal of the most recent access on the store's logical clock;
    /// drives LRU ordering
    last_accessed: AtomicU64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// `expires_at` is derived as `now_ms + ttl`, so it is never earlier than
    /// `created_at`; a TTL too large for a millisecond deadline clamps to the
    /// maximum instead of wrapping. A zero TTL produces an entry that is
    /// already at its deadline.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `now_ms` - Current time in Unix milliseconds
    /// * `ttl` - Optional time to live
    /// * `ticket` - Insertion ordinal on the owning store's access clock
    pub fn new(value: V, now_ms: u64, ttl: Option<Duration>, ticket: u64) -> Self {
        let expires_at = ttl.map(|ttl| {
            now_ms.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
        });

        Self {
            value,
            created_at: now_ms,
            expires_at,
            last_accessed: AtomicU64::new(ticket),
        }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Creation timestamp in Unix milliseconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Expiration timestamp in Unix milliseconds, or None if the entry never
    /// expires.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Access ordinal of the most recent read hit (the insertion ordinal if
    /// never read).
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    // == Touch ==
    /// Records a read hit, refreshing the entry's recency.
    ///
    /// Recency ordering is a heuristic, so a relaxed store is enough here.
    pub fn touch(&self, ticket: u64) {
        self.last_accessed.store(ticket, Ordering::Relaxed);
    }

    /// Eviction ordering key: least recently used first, ties broken by
    /// oldest creation.
    pub fn recency(&self) -> Recency {
        Recency {
            last_accessed: self.last_accessed(),
            created_at: self.created_at,
        }
    }
}

impl<V: Clone> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_accessed: AtomicU64::new(self.last_accessed()),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// The only place the crate reads the system clock.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
