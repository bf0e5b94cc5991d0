//! Expiration Policy Module
//!
//! Decides whether an entry is stale at a given instant. The policy is a pure
//! function of the entry's deadline and the supplied clock reading; removal of
//! stale entries is the store's job.

use super::entry::CacheEntry;

// == Expiration Policy ==
/// Stateless staleness predicate, shared by value with every store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationPolicy;

impl ExpirationPolicy {
    /// Checks whether the entry has expired at `now_ms`.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to its expiration time, so an entry observed
    /// exactly at its deadline is already stale.
    ///
    /// The result is monotonic in `now_ms`: once expired, expired forever.
    ///
    /// # Returns
    /// - `true` if the entry has a deadline and `now_ms` >= that deadline
    /// - `false` if the entry has no deadline or the deadline lies ahead
    pub fn is_expired<V>(&self, entry: &CacheEntry<V>, now_ms: u64) -> bool {
        match entry.expires_at() {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}
