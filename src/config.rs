//! Configuration Module
//!
//! Construction-time options for cache stores. The hosting application owns
//! config loading; this crate only receives the resulting values.

use std::time::Duration;

use crate::error::{CacheError, Result};

/// Options for a single cache store.
///
/// The default is an unbounded store whose entries never expire. The manager
/// holds one `StoreConfig` as the template for lazily created stores; a
/// per-name override can be supplied at first reference.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Maximum number of entries; `None` means unbounded
    pub capacity: Option<usize>,
    /// TTL applied to entries stored without an explicit TTL; `None` means
    /// such entries never expire
    pub default_ttl: Option<Duration>,
}

impl StoreConfig {
    /// Creates the default configuration: unbounded, no expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets the TTL used when an entry is stored without an explicit TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Validates the configuration.
    ///
    /// # Returns
    /// `CacheError::Configuration` when a bound is present but not positive.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == Some(0) {
            return Err(CacheError::Configuration(
                "capacity must be at least 1 when bounded".to_string(),
            ));
        }
        Ok(())
    }
}
