//! Expiry Sweep Task
//!
//! Freshness is enforced lazily on access; the sweep reclaims memory held by
//! stale entries nobody asks for.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::PromptCache;

/// Spawns a background task that purges expired entries every `interval`.
///
/// Returns the task handle so the caller can abort it on shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(PromptCache::new(CacheConfig::default())?);
/// let sweep = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task<V>(cache: Arc<PromptCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Hash + Eq + Send + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();
            if removed > 0 {
                info!(removed, remaining = cache.len(), "Expiry sweep purged stale entries");
            } else {
                debug!("Expiry sweep: nothing stale");
            }
        }
    })
}
