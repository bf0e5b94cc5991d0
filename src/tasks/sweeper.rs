//! Expired-Entry Sweeper Task
//!
//! Background task that periodically removes expired entries from every store
//! of a manager, complementing the lazy removal done on reads.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::manager::CacheManager;

/// Spawns a background task that periodically purges expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Each sweep visits every store currently registered with
/// the manager.
///
/// The caller owns the returned handle; abort it to stop the sweeper during
/// graceful shutdown. Shutting the manager down does not stop the sweeper,
/// it just leaves it sweeping an empty registry.
///
/// # Arguments
/// * `manager` - The manager whose stores are swept
/// * `interval` - Time between sweeps
///
/// # Example
/// ```ignore
/// let manager: CacheManager<String> = CacheManager::with_defaults();
/// let sweeper = spawn_sweeper_task(manager.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper_task<V>(manager: CacheManager<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting expired-entry sweeper");

        loop {
            tokio::time::sleep(interval).await;

            let removed = manager.purge_expired().await;

            if removed > 0 {
                info!(removed, "sweeper removed expired entries");
            } else {
                debug!("sweeper found no expired entries");
            }
        }
    })
}
