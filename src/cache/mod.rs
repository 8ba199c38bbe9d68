// In-memory caching for remote fetch results.
// Namespaced TTL caches that avoid redundant round-trips to the backend.

pub mod registry;
pub mod store;

pub use registry::{CacheRegistry, CleanupTask, DEFAULT_CLEANUP_PERIOD, spawn_cleanup};
pub use store::{Cache, CacheStats, DEFAULT_TTL};
