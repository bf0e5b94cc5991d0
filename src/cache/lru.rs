//! LRU Victim Selection Module
//!
//! Orders entries for Least Recently Used eviction. Entries carry their own
//! access ordinals, so eviction is a minimum-selection over recency keys
//! rather than a separately maintained queue.

// == Recency ==
/// Eviction ordering key for a cache entry.
///
/// Derived ordering compares `last_accessed` first, then `created_at`: the
/// least recently used entry is the smallest, and entries tied on access
/// ordinal lose to the one created earliest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Recency {
    /// Ordinal of the most recent access on the store's logical clock
    pub last_accessed: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
}

// == Select Victim ==
/// Returns the key with the smallest recency, i.e. the entry to evict.
///
/// Returns None when the iterator is empty.
pub fn select_victim<K, I>(entries: I) -> Option<K>
where
    I: IntoIterator<Item = (K, Recency)>,
{
    entries
        .into_iter()
        .min_by_key(|(_, recency)| *recency)
        .map(|(key, _)| key)
}
