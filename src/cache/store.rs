//! Cache Store Module
//!
//! One named cache: HashMap storage with TTL expiration, LRU eviction at
//! capacity and single-flight computation. A store is a cheap-to-clone handle
//! over shared state, so background tasks and callers can hold it freely.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::debug;

use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::expiry::ExpirationPolicy;
use crate::cache::lru;
use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::config::StoreConfig;
use crate::error::{BoxError, CacheError, Result};

// == Flight Bookkeeping ==
/// Outcome slot of an in-flight computation; `None` until published.
type FlightOutcome<V> = Option<Result<V>>;

/// A pending computation that concurrent callers subscribe to.
///
/// The id makes cleanup precise: a record is only ever removed by the flight
/// it belongs to, so a crashed flight cannot delete its successor's record.
struct Flight<V> {
    id: u64,
    outcome: watch::Receiver<FlightOutcome<V>>,
}

/// What a caller turned out to be after the miss path raced for the key.
enum Role<V> {
    /// This caller owns the computation and publishes on the sender.
    Lead(u64, watch::Sender<FlightOutcome<V>>),
    /// Another caller got there first; await its outcome.
    Join(u64, watch::Receiver<FlightOutcome<V>>),
}

// == Cache Store ==
/// A named cache with LRU eviction, TTL expiration and single-flight
/// computation.
pub struct CacheStore<V> {
    /// Store identity, used in log fields
    name: Arc<str>,
    /// Maximum number of entries; None = unbounded
    capacity: Option<usize>,
    /// TTL for entries stored without an explicit one; None = no expiry
    default_ttl: Option<Duration>,
    /// Staleness predicate
    policy: ExpirationPolicy,
    /// Key-value storage
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    /// Logical clock for LRU recency; bumped on every insert and read hit
    access_clock: Arc<AtomicU64>,
    /// At most one pending computation per key
    in_flight: Arc<Mutex<HashMap<String, Flight<V>>>>,
    /// Ticket source for flight ids
    flight_ids: Arc<AtomicU64>,
    /// Performance statistics
    stats: Arc<CacheStats>,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a new store from a validated configuration.
    ///
    /// # Arguments
    /// * `name` - Store identity, used in logs and by the manager registry
    /// * `config` - Capacity and default-TTL options
    ///
    /// # Returns
    /// `CacheError::Configuration` when the configuration is invalid
    /// (bounded capacity of zero).
    pub fn new(name: impl Into<String>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(name, config))
    }

    /// Builds a store from a configuration the caller already validated.
    pub(crate) fn from_validated(name: impl Into<String>, config: StoreConfig) -> Self {
        Self {
            name: Arc::from(name.into()),
            capacity: config.capacity,
            default_ttl: config.default_ttl,
            policy: ExpirationPolicy,
            entries: Arc::new(RwLock::new(HashMap::new())),
            access_clock: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            flight_ids: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// The store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured capacity; None = unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// The configured default TTL; None = entries without a TTL never expire.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Next ordinal on the store's access clock.
    ///
    /// Recency uses this logical clock rather than wall time, so bursts of
    /// operations inside one clock millisecond still evict in exact access
    /// order.
    fn next_access_ticket(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    // == Get ==
    /// Retrieves the value for `key` if present and not expired.
    ///
    /// A hit refreshes the entry's recency. A stale entry is removed and
    /// reported as absent; absence is `None`, never an error.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = current_timestamp_ms();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !self.policy.is_expired(entry, now) => {
                    entry.touch(self.next_access_ticket());
                    self.stats.record_hit();
                    return Some(entry.value().clone());
                }
                // Stale: fall through to the write path below.
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        // Re-check under the write lock: a racing put may have refreshed the
        // key while we waited.
        let mut entries = self.entries.write().await;
        let now = current_timestamp_ms();
        let stale = match entries.get(key) {
            Some(entry) if self.policy.is_expired(entry, now) => true,
            Some(entry) => {
                entry.touch(self.next_access_ticket());
                self.stats.record_hit();
                return Some(entry.value().clone());
            }
            None => false,
        };

        if stale {
            entries.remove(key);
            self.stats.record_expirations(1);
            debug!(cache = %self.name, key, "removed expired entry on read");
        }

        self.stats.record_miss();
        None
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// Concurrent callers for the same key share a single computation: one
    /// caller runs `compute`, the rest await the same outcome. The
    /// computation runs on its own task, so a caller that abandons interest
    /// (timeout, drop) does not cancel it for the others.
    ///
    /// # Arguments
    /// * `key` - The key to retrieve or compute
    /// * `ttl` - TTL for the stored value; falls back to the store default
    /// * `compute` - Produces the value on a miss
    ///
    /// # Returns
    /// `CacheError::Compute` when `compute` fails; the failure reaches every
    /// caller coalesced onto that invocation and nothing is stored, so a
    /// subsequent call retries.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, BoxError>> + Send + 'static,
    {
        self.get_or_compute_if(key, ttl, compute, |_| true).await
    }

    // == Get Or Compute If ==
    /// As [`get_or_compute`](Self::get_or_compute), but the computed value is
    /// only stored when `should_cache` approves it. The value is returned to
    /// every waiter either way.
    pub async fn get_or_compute_if<F, Fut, P>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
        should_cache: P,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, BoxError>> + Send + 'static,
        P: FnOnce(&V) -> bool + Send + 'static,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let (id, tx) = loop {
            let role = {
                let mut in_flight = self.in_flight.lock().await;
                match in_flight.get(key) {
                    Some(flight) => Role::Join(flight.id, flight.outcome.clone()),
                    None => {
                        let id = self.flight_ids.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(key.to_string(), Flight { id, outcome: rx });
                        Role::Lead(id, tx)
                    }
                }
            };

            match role {
                Role::Lead(id, tx) => break (id, tx),
                Role::Join(id, outcome) => {
                    debug!(cache = %self.name, key, "joining in-flight computation");
                    match Self::await_outcome(outcome).await {
                        Some(result) => return result,
                        None => {
                            // The leading task died without publishing. Drop
                            // its record if nobody has yet, re-check the
                            // store and race for a fresh flight.
                            self.remove_flight(key, id).await;
                            if let Some(value) = self.get(key).await {
                                return Ok(value);
                            }
                        }
                    }
                }
            }
        };

        self.lead_flight(key, id, ttl, tx, compute, should_cache).await
    }

    /// Runs the computation this caller now owns and publishes the outcome.
    async fn lead_flight<F, Fut, P>(
        &self,
        key: &str,
        id: u64,
        ttl: Option<Duration>,
        tx: watch::Sender<FlightOutcome<V>>,
        compute: F,
        should_cache: P,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, BoxError>> + Send + 'static,
        P: FnOnce(&V) -> bool + Send + 'static,
    {
        debug!(cache = %self.name, key, "leading computation");

        let store = self.clone();
        let key_owned = key.to_string();
        let future = compute();

        let task = tokio::spawn(async move {
            let result = match future.await {
                Ok(value) => {
                    if should_cache(&value) {
                        store.put(key_owned.as_str(), value.clone(), ttl).await;
                    } else {
                        debug!(
                            cache = %store.name,
                            key = %key_owned,
                            "computed value rejected by caching predicate"
                        );
                    }
                    Ok(value)
                }
                Err(source) => Err(CacheError::compute(key_owned.as_str(), source)),
            };

            // Remove the record before publishing so a caller arriving after
            // a failure starts a fresh computation instead of inheriting the
            // stale outcome.
            store.remove_flight(&key_owned, id).await;
            let _ = tx.send(Some(result.clone()));
            result
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                // The computation panicked; waiters clean up on their side
                // too, but do it here as well in case none are left.
                self.remove_flight(key, id).await;
                Err(CacheError::compute(key, Box::new(join_error)))
            }
        }
    }

    /// Waits for a flight to publish its outcome.
    ///
    /// Returns None if the sender dropped without publishing (the leading
    /// task was torn down mid-computation).
    async fn await_outcome(mut outcome: watch::Receiver<FlightOutcome<V>>) -> Option<Result<V>> {
        loop {
            if let Some(result) = outcome.borrow_and_update().clone() {
                return Some(result);
            }
            if outcome.changed().await.is_err() {
                // Sender gone; the last published value settles it.
                return outcome.borrow().clone();
            }
        }
    }

    /// Removes the flight record for `key`, but only if it still belongs to
    /// flight `id`.
    async fn remove_flight(&self, key: &str, id: u64) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(key).map(|flight| flight.id) == Some(id) {
            in_flight.remove(key);
        }
    }

    // == Put ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// An existing key is overwritten with all timestamps refreshed. When a
    /// new key would overflow a bounded store, the least recently used entry
    /// is evicted first, inside the same critical section, so the capacity
    /// bound holds at every observation point.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses the store default if None)
    pub async fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let mut entries = self.entries.write().await;
        self.insert_entry(&mut entries, key, value, ttl);
    }

    /// Inserts under an already-held write lock, evicting first if needed.
    fn insert_entry(
        &self,
        entries: &mut HashMap<String, CacheEntry<V>>,
        key: String,
        value: V,
        ttl: Option<Duration>,
    ) {
        let is_overwrite = entries.contains_key(&key);

        if !is_overwrite {
            if let Some(capacity) = self.capacity {
                if entries.len() >= capacity {
                    let victim = lru::select_victim(
                        entries.iter().map(|(k, entry)| (k.as_str(), entry.recency())),
                    )
                    .map(str::to_string);

                    if let Some(victim) = victim {
                        entries.remove(&victim);
                        self.stats.record_eviction();
                        debug!(
                            cache = %self.name,
                            key = %victim,
                            "evicted least recently used entry"
                        );
                    }
                }
            }
        }

        let ttl = ttl.or(self.default_ttl);
        let entry = CacheEntry::new(value, current_timestamp_ms(), ttl, self.next_access_ticket());
        entries.insert(key, entry);
    }

    // == Evict ==
    /// Removes the entry for `key`.
    ///
    /// Idempotent: evicting an absent key reports `false`, never an error.
    pub async fn evict(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(key).is_some();
        if removed {
            debug!(cache = %self.name, key, "evicted entry");
        }
        removed
    }

    // == Evict All ==
    /// Clears every entry. Idempotent.
    ///
    /// Computations already in flight are unaffected: they complete, deliver
    /// to their waiters and store their results afterwards.
    pub async fn evict_all(&self) {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        if removed > 0 {
            debug!(cache = %self.name, removed, "cleared all entries");
        }
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.policy.is_expired(entry, now));
        let removed = before - entries.len();

        if removed > 0 {
            self.stats.record_expirations(removed as u64);
            debug!(cache = %self.name, removed, "purged expired entries");
        }
        removed
    }

    // == Length ==
    /// Returns the current number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the store's counters.
    pub async fn stats(&self) -> StatsSnapshot {
        let len = self.entries.read().await.len();
        self.stats.snapshot(len)
    }
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            capacity: self.capacity,
            default_ttl: self.default_ttl,
            policy: self.policy,
            entries: self.entries.clone(),
            access_clock: self.access_clock.clone(),
            in_flight: self.in_flight.clone(),
            flight_ids: self.flight_ids.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
