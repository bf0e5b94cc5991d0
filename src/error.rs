//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error type accepted from compute closures.
///
/// Anything that converts into a boxed error (`std::io::Error`,
/// `anyhow::Error`, plain strings via `.into()`) can be signalled from a
/// `get_or_compute` closure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// Lookups never produce errors: `get` reports absence as `None` and `evict`
/// as `false`. Errors arise only when a compute closure fails or when the
/// layer is misconfigured.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// A compute closure passed to `get_or_compute` failed.
    ///
    /// The cause is shared behind an `Arc` so every waiter coalesced onto the
    /// same in-flight computation receives the same underlying error.
    #[error("computation for key '{key}' failed: {source}")]
    Compute {
        key: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// Invalid setup: zero capacity, invalidation dependency cycle.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Wrap a compute failure for the given key.
    pub(crate) fn compute(key: impl Into<String>, source: BoxError) -> Self {
        CacheError::Compute {
            key: key.into(),
            source: Arc::from(source),
        }
    }

    /// True for the `Compute` variant.
    pub fn is_compute(&self) -> bool {
        matches!(self, CacheError::Compute { .. })
    }

    /// True for the `Configuration` variant.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CacheError::Configuration(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
