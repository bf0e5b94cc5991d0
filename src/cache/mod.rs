//! Cache Module
//!
//! Provides the per-store machinery: entries, expiration policy, LRU victim
//! selection, statistics and the store itself.

mod entry;
mod expiry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use expiry::ExpirationPolicy;
pub use lru::Recency;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::CacheStore;
