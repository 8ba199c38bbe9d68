// Named cache namespaces with per-purpose presets.
// Owns the periodic cleanup task that bounds memory across all namespaces.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::store::Cache;

/// How often the background task sweeps expired entries: 5 minutes.
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(5 * 60);

const USER_TTL: Duration = Duration::from_secs(5 * 60);
const PROJECT_TTL: Duration = Duration::from_secs(2 * 60);
const ANALYTICS_TTL: Duration = Duration::from_secs(10 * 60);
const CONFIG_TTL: Duration = Duration::from_secs(30 * 60);
const ASSET_TTL: Duration = Duration::from_secs(60 * 60);

/// The application's cache namespaces.
///
/// Each namespace is independently configured and independently
/// invalidated; clearing one never affects another. Construct a registry
/// once at startup and pass it by reference to whatever needs it.
#[derive(Debug)]
pub struct CacheRegistry {
    /// Profiles and account data for the signed-in user.
    pub user: Cache,
    /// Project listings and detail records.
    pub project: Cache,
    /// Aggregated dashboard metrics.
    pub analytics: Cache,
    /// Application configuration fetched from the backend.
    pub config: Cache,
    /// Resolved asset URLs and small binary metadata.
    pub asset: Cache,
}

impl CacheRegistry {
    /// Create all namespaces with their presets.
    pub fn new() -> Self {
        Self {
            user: Cache::new("user", USER_TTL, 100),
            project: Cache::new("project", PROJECT_TTL, 200),
            analytics: Cache::new("analytics", ANALYTICS_TTL, 50),
            config: Cache::new("config", CONFIG_TTL, 20),
            asset: Cache::new("asset", ASSET_TTL, 500),
        }
    }

    /// All namespaces, for fan-out operations.
    pub fn all(&self) -> [&Cache; 5] {
        [
            &self.user,
            &self.project,
            &self.analytics,
            &self.config,
            &self.asset,
        ]
    }

    /// Sweep expired entries from every namespace. Returns the total removed.
    pub fn cleanup_all(&self) -> usize {
        self.all().iter().map(|cache| cache.cleanup()).sum()
    }

    /// Drop every entry from every namespace.
    pub fn clear_all(&self) {
        for cache in self.all() {
            cache.clear();
        }
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for the background sweep task.
///
/// Dropping the handle aborts the task, so a discarded registry is never
/// referenced by a dangling timer.
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a task that sweeps all namespaces every `period`.
///
/// The lazy expiry checks on access remain the correctness guarantee;
/// the sweep only bounds memory.
pub fn spawn_cleanup(registry: Arc<CacheRegistry>, period: Duration) -> CleanupTask {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it.
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = registry.cleanup_all();
            if removed > 0 {
                debug!(removed, "periodic cache sweep");
            }
        }
    });

    CleanupTask { handle }
}
