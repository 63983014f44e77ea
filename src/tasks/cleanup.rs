//! Expired-entry sweep
//!
//! Background task that periodically drops expired cache entries and
//! finished rate-limit windows. Reads already ignore expired entries, so the
//! sweep only reclaims memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::RateLimiter;
use crate::cache::CacheStore;

/// Spawns a background task that sweeps every `cleanup_interval_secs` seconds.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(state.store.clone(), state.limiter.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    store: Arc<dyn CacheStore>,
    limiter: Arc<RateLimiter>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match store.purge_expired(Utc::now()).await {
                Ok(0) => debug!("Cache sweep: no expired entries found"),
                Ok(removed) => info!("Cache sweep: removed {} expired entries", removed),
                Err(err) => warn!(error = %err, "Cache sweep failed"),
            }

            let pruned = limiter.prune();
            if pruned > 0 {
                debug!("Cache sweep: forgot {} idle clients", pruned);
            }
        }
    })
}
