// In-memory cache with per-entry TTL.
// Handles lazy expiry, capacity eviction, and the read-through fetch pattern.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Default TTL for cached values: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A single cached value with its insertion time and lifetime.
struct CacheEntry {
    /// The cached value, opaque to the cache.
    value: Box<dyn Any + Send + Sync>,
    /// When the value was stored.
    stored_at: DateTime<Utc>,
    /// Lifetime after which the value is considered expired.
    ttl: Duration,
}

impl CacheEntry {
    /// Check if this entry has outlived its TTL.
    fn is_expired(&self) -> bool {
        let elapsed = Utc::now()
            .signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::MAX);

        elapsed > self.ttl
    }
}

/// Diagnostic snapshot of a cache namespace.
///
/// Counts are recomputed on every call by re-checking entry ages,
/// so they never drift from the actual table contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub max_size: usize,
}

/// An in-memory key-value cache namespace with per-entry TTL.
///
/// Expiry is checked lazily on access; an expired entry is physically
/// removed by the first read that finds it. A periodic [`Cache::cleanup`]
/// sweep bounds memory but is never required for correctness.
pub struct Cache {
    name: String,
    default_ttl: Duration,
    max_size: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Cache {
    /// Create a cache namespace with the given default TTL and capacity.
    pub fn new(name: impl Into<String>, default_ttl: Duration, max_size: usize) -> Self {
        Self {
            name: name.into(),
            default_ttl,
            max_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Name of this namespace, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default TTL applied by [`Cache::set`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a clone of the cached value, if present and not expired.
    ///
    /// An entry found expired is removed as a side effect. A stored value
    /// of a different type than `T` is treated as a miss.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().unwrap();

        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => return None,
        };

        if expired {
            entries.remove(key);
            return None;
        }

        entries
            .get(key)
            .and_then(|entry| entry.value.downcast_ref::<T>())
            .cloned()
    }

    /// Store a value under `key` with the default TTL.
    pub fn set<T>(&self, key: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value under `key` with an explicit TTL.
    ///
    /// Overwriting resets the entry's age to now. Inserting a new key into
    /// a full table first sweeps expired entries, then evicts the oldest
    /// entries until there is room. Never fails.
    pub fn set_with_ttl<T>(&self, key: &str, value: T, ttl: Duration)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().unwrap();

        if !entries.contains_key(key) && entries.len() >= self.max_size {
            let swept = Self::sweep(&mut entries);
            if swept > 0 {
                debug!(cache = %self.name, swept, "swept expired entries before insert");
            }

            while entries.len() >= self.max_size {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone());

                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                        debug!(cache = %self.name, key = %oldest, "evicted oldest entry at capacity");
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value: Box::new(value),
                stored_at: Utc::now(),
                ttl,
            },
        );
    }

    /// Check whether a live entry exists for `key`.
    ///
    /// Same expiry side effect as [`Cache::get`], but type-agnostic.
    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove an entry. Returns whether something was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Remove all entries in this namespace.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Remove every expired entry. Returns the number removed.
    ///
    /// Invoked periodically by the registry's sweep task and
    /// opportunistically before inserts near capacity.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let removed = Self::sweep(&mut entries);
        if removed > 0 {
            debug!(cache = %self.name, removed, "cleanup sweep");
        }
        removed
    }

    /// Snapshot entry counts without mutating the table.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        let expired = entries.values().filter(|entry| entry.is_expired()).count();

        CacheStats {
            total: entries.len(),
            valid: entries.len() - expired,
            expired,
            max_size: self.max_size,
        }
    }

    /// Return the cached value for `key`, fetching it on a miss.
    ///
    /// On a miss the `fetcher` is awaited; its result is stored with the
    /// default TTL and returned. A fetch failure propagates verbatim and
    /// nothing is cached. Concurrent misses for the same key each fetch
    /// independently.
    pub async fn read_through<T, E, F, Fut>(&self, key: &str, fetcher: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.read_through_with_ttl(key, self.default_ttl, fetcher)
            .await
    }

    /// [`Cache::read_through`] with an explicit TTL for the stored value.
    pub async fn read_through_with_ttl<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        // Lock is released before awaiting the fetcher.
        let value = fetcher().await?;
        self.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove every entry whose key contains `pattern` as a substring.
    ///
    /// Used to invalidate a family of related entries (e.g. everything
    /// keyed by one entity id). Returns the number removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(cache = %self.name, pattern, removed, "invalidated by pattern");
        }
        removed
    }

    /// Drop every expired entry from the table, returning the count.
    fn sweep(entries: &mut HashMap<String, CacheEntry>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("max_size", &self.max_size)
            .field("entries", &self.entries.lock().unwrap().len())
            .finish()
    }
}
