//! Cache Manager Module
//!
//! The facade consumers hold: a registry of named stores created lazily from
//! a template configuration, plus the invalidation table that cascades writes
//! into wholesale clears of dependent caches. The manager is a cheap-to-clone
//! handle; one instance is created at application startup and shared.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheStore, StatsSnapshot};
use crate::config::StoreConfig;
use crate::error::{BoxError, Result};
use crate::invalidation::InvalidationTable;

// == Cache Manager ==
/// Registry of named cache stores with write-through invalidation.
pub struct CacheManager<V> {
    /// Named stores, created on first reference
    stores: Arc<RwLock<HashMap<String, CacheStore<V>>>>,
    /// Template for lazily created stores
    default_config: StoreConfig,
    /// Trigger → dependents table; written during setup, read on writes
    invalidation: Arc<RwLock<InvalidationTable>>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a manager whose lazily created stores use `default_config`.
    ///
    /// The template is validated once here, so store creation on first
    /// reference cannot fail later.
    pub fn new(default_config: StoreConfig) -> Result<Self> {
        default_config.validate()?;

        Ok(Self {
            stores: Arc::new(RwLock::new(HashMap::new())),
            default_config,
            invalidation: Arc::new(RwLock::new(InvalidationTable::new())),
        })
    }

    /// Creates a manager with unbounded, non-expiring stores.
    pub fn with_defaults() -> Self {
        Self {
            stores: Arc::new(RwLock::new(HashMap::new())),
            default_config: StoreConfig::default(),
            invalidation: Arc::new(RwLock::new(InvalidationTable::new())),
        }
    }

    // == Cache ==
    /// Returns the named store, creating it from the default configuration on
    /// first reference.
    ///
    /// Creation happens under the registry write lock, so concurrent calls
    /// with the same unseen name observe exactly one store.
    pub async fn cache(&self, name: &str) -> CacheStore<V> {
        {
            let stores = self.stores.read().await;
            if let Some(store) = stores.get(name) {
                return store.clone();
            }
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(name) {
            return store.clone();
        }

        // Template validated at construction.
        let store = CacheStore::from_validated(name, self.default_config.clone());
        info!(cache = name, "created cache store");
        stores.insert(name.to_string(), store.clone());
        store
    }

    // == Cache With ==
    /// As [`cache`](Self::cache), with a per-name configuration honored at
    /// first reference.
    ///
    /// If the store already exists, the override is ignored and the existing
    /// store returned: the first reference fixed its shape.
    ///
    /// # Returns
    /// `CacheError::Configuration` when `config` is invalid.
    pub async fn cache_with(&self, name: &str, config: StoreConfig) -> Result<CacheStore<V>> {
        config.validate()?;

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(name) {
            debug!(cache = name, "store already exists, configuration override ignored");
            return Ok(store.clone());
        }

        let store = CacheStore::from_validated(name, config);
        info!(cache = name, "created cache store");
        stores.insert(name.to_string(), store.clone());
        Ok(store)
    }

    // == Register Dependency ==
    /// Declares that writes to `trigger` must clear every cache in
    /// `dependents`. Additive; rejects dependency cycles.
    ///
    /// Intended for application startup, before traffic flows.
    pub async fn register_dependency<I, S>(&self, trigger: &str, dependents: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidation.write().await.register(trigger, dependents)
    }

    // == Get ==
    /// Retrieves a value from the named store.
    ///
    /// Absence (unknown cache, unknown key, expired entry) is `None`.
    pub async fn get(&self, cache: &str, key: &str) -> Option<V> {
        let store = {
            let stores = self.stores.read().await;
            stores.get(cache).cloned()
        };
        match store {
            Some(store) => store.get(key).await,
            None => None,
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key` in the named store, computing and
    /// storing it on a miss. See [`CacheStore::get_or_compute`].
    pub async fn get_or_compute<F, Fut>(
        &self,
        cache: &str,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, BoxError>> + Send + 'static,
    {
        self.cache(cache).await.get_or_compute(key, ttl, compute).await
    }

    // == Get Or Compute If ==
    /// Conditional variant; the computed value is stored only when
    /// `should_cache` approves it. See [`CacheStore::get_or_compute_if`].
    pub async fn get_or_compute_if<F, Fut, P>(
        &self,
        cache: &str,
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
        self.cache(cache)
            .await
            .get_or_compute_if(key, ttl, compute, should_cache)
            .await
    }

    // == Put ==
    /// Stores a value in the named store, then clears every registered
    /// dependent of that cache.
    pub async fn put(&self, cache: &str, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.cache(cache).await.put(key, value, ttl).await;
        self.cascade_from(cache).await;
    }

    // == Evict ==
    /// Removes a single key from the named store.
    ///
    /// No cascade: removing one entry does not imply dependent caches went
    /// stale wholesale. Unknown caches and keys report `false`.
    pub async fn evict(&self, cache: &str, key: &str) -> bool {
        let store = {
            let stores = self.stores.read().await;
            stores.get(cache).cloned()
        };
        match store {
            Some(store) => store.evict(key).await,
            None => false,
        }
    }

    // == Evict All ==
    /// Clears the named store, then clears every registered dependent.
    /// Idempotent; unknown caches are a no-op (nothing cached yet).
    pub async fn evict_all(&self, cache: &str) {
        let store = {
            let stores = self.stores.read().await;
            stores.get(cache).cloned()
        };
        if let Some(store) = store {
            store.evict_all().await;
        }
        self.cascade_from(cache).await;
    }

    /// Clears every instantiated dependent of `trigger`.
    ///
    /// One level deep: the table is the complete declaration, and the clears
    /// use store-level evict-all, which cannot itself re-cascade.
    async fn cascade_from(&self, trigger: &str) {
        let dependents: Vec<String> = {
            let table = self.invalidation.read().await;
            table.dependents_of(trigger).map(str::to_string).collect()
        };
        if dependents.is_empty() {
            return;
        }

        let targets: Vec<CacheStore<V>> = {
            let stores = self.stores.read().await;
            dependents
                .iter()
                .filter_map(|name| stores.get(name).cloned())
                .collect()
        };

        for store in targets {
            store.evict_all().await;
            debug!(trigger, cache = store.name(), "cleared dependent cache");
        }
    }

    // == Purge Expired ==
    /// Removes expired entries from every store.
    ///
    /// Returns the total number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let stores: Vec<CacheStore<V>> = {
            let stores = self.stores.read().await;
            stores.values().cloned().collect()
        };

        let mut removed = 0;
        for store in stores {
            removed += store.purge_expired().await;
        }
        removed
    }

    // == Stats ==
    /// Returns a statistics snapshot for every store.
    pub async fn stats(&self) -> HashMap<String, StatsSnapshot> {
        let stores: Vec<CacheStore<V>> = {
            let stores = self.stores.read().await;
            stores.values().cloned().collect()
        };

        let mut stats = HashMap::new();
        for store in stores {
            let snapshot = store.stats().await;
            stats.insert(store.name().to_string(), snapshot);
        }
        stats
    }

    /// Names of the currently instantiated stores.
    pub async fn store_names(&self) -> Vec<String> {
        let stores = self.stores.read().await;
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    // == Shutdown ==
    /// Clears and forgets every store. Idempotent.
    ///
    /// Computations still in flight complete and deliver to their waiters;
    /// their stored results vanish with the forgotten store handles.
    pub async fn shutdown(&self) {
        let stores: Vec<CacheStore<V>> = {
            let mut stores = self.stores.write().await;
            stores.drain().map(|(_, store)| store).collect()
        };

        for store in &stores {
            store.evict_all().await;
        }
        if !stores.is_empty() {
            info!(count = stores.len(), "cache manager shut down");
        }
    }
}

impl<V> Clone for CacheManager<V> {
    fn clone(&self) -> Self {
        Self {
            stores: self.stores.clone(),
            default_config: self.default_config.clone(),
            invalidation: self.invalidation.clone(),
        }
    }
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}
