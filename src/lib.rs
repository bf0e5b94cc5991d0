//! Flightcache - an in-process caching layer
//!
//! Named cache stores with TTL expiration, LRU eviction, single-flight
//! computation and declarative cross-cache invalidation. Expensive lookups go
//! through [`CacheManager::get_or_compute`] so concurrent callers share one
//! computation, and writes cascade through registered invalidation rules so
//! derived caches never serve stale data.
//!
//! ```ignore
//! let manager: CacheManager<String> = CacheManager::with_defaults();
//! manager.register_dependency("users", ["allUsers"]).await?;
//!
//! let user = manager
//!     .get_or_compute("users", "u42", None, || async {
//!         Ok(load_user_from_backend("u42").await?)
//!     })
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod manager;
pub mod tasks;

pub use cache::{CacheEntry, CacheStore, ExpirationPolicy, StatsSnapshot};
pub use config::StoreConfig;
pub use error::{BoxError, CacheError, Result};
pub use invalidation::InvalidationTable;
pub use manager::CacheManager;
pub use tasks::spawn_sweeper_task;
