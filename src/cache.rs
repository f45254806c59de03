//! Time-to-live cache with stale-on-error fallback.
//!
//! Entries become stale after a configurable TTL but are retained until an
//! explicit [`TtlCache::sweep`], so a failed refresh can still be answered with
//! the last known value instead of an error.
//!
//! Timestamps use [`tokio::time::Instant`], so tests can drive expiry with the
//! runtime's paused clock instead of sleeping in real time.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use feedrelay::cache::TtlCache;
//!
//! # #[tokio::main] async fn main() {
//! let mut cache: TtlCache<String, i64> = TtlCache::new(Duration::from_secs(300));
//!
//! cache.insert("alice".to_string(), 42);
//! assert_eq!(cache.get(&"alice".to_string()), Some(&42));
//! assert_eq!(cache.get(&"bob".to_string()), None);
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::FeedError;

/// A single cached value and the moment it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// When the value was stored.
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }
}

/// A key-value cache whose entries expire after a configurable TTL.
///
/// Expired entries are logically stale but stay in the map until [`sweep`]
/// removes them; [`peek_stale`] can still read them as a degraded fallback.
///
/// [`sweep`]: TtlCache::sweep
/// [`peek_stale`]: TtlCache::peek_stale
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
{
    /// Create a new TTL cache with the specified time-to-live duration.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Insert a key-value pair, timestamped with the current time.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Get a reference to a value if it exists and is still fresh.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(|entry| {
            if entry.age() < self.ttl {
                Some(&entry.value)
            } else {
                None
            }
        })
    }

    /// Get a reference to a value regardless of freshness.
    ///
    /// Used for the stale-on-error fallback: when a refresh fails, a stale
    /// value beats no value.
    pub fn peek_stale(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Get the age of an entry, fresh or stale.
    pub fn age(&self, key: &K) -> Option<Duration> {
        self.entries.get(key).map(CacheEntry::age)
    }

    /// Remove an entry, returning its value if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Remove all entries whose age has reached the TTL.
    ///
    /// Idempotent; returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age() < ttl);
        before - self.entries.len()
    }

    /// Number of entries in the cache, including stale ones awaiting sweep.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are still fresh.
    pub fn fresh_count(&self) -> usize {
        let ttl = self.ttl;
        self.entries.values().filter(|e| e.age() < ttl).count()
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get the TTL duration for this cache.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// A clone-shareable handle to a [`TtlCache`] with an async read-through path.
///
/// [`get_or_fetch`] is the single entry point the service uses: fresh hits are
/// served from memory, misses go through the supplied fetch future (routed by
/// the caller through the request queue), and fetch failures fall back to a
/// retained stale value when one exists.
///
/// [`get_or_fetch`]: SharedCache::get_or_fetch
#[derive(Debug)]
pub struct SharedCache<K, V> {
    inner: Arc<Mutex<TtlCache<K, V>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Display,
    V: Clone,
{
    /// Create a new shared cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TtlCache::new(ttl))),
        }
    }

    /// Get a fresh value if cached.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().await.get(key).cloned()
    }

    /// Insert a value.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.lock().await.insert(key, value);
    }

    /// Remove entries stale beyond the TTL. Returns the number removed.
    pub async fn sweep(&self) -> usize {
        self.inner.lock().await.sweep()
    }

    /// Return the cached value if fresh; otherwise run `fetch` and store the
    /// result.
    ///
    /// If `fetch` fails and any value is retained for the key (even a stale
    /// one), the stale value is returned instead of the error. The error only
    /// propagates when there is nothing to fall back to.
    ///
    /// The cache lock is not held across the fetch, so concurrent reads of
    /// other keys proceed during slow upstream calls.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, FeedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FeedError>>,
    {
        if let Some(value) = self.inner.lock().await.get(&key) {
            tracing::debug!(%key, "cache hit");
            return Ok(value.clone());
        }

        match fetch().await {
            Ok(value) => {
                self.inner.lock().await.insert(key, value.clone());
                Ok(value)
            }
            Err(err) => {
                let mut guard = self.inner.lock().await;
                if let Some(stale) = guard.peek_stale(&key) {
                    tracing::warn!(%key, error = %err, "fetch failed, serving stale cache entry");
                    Ok(stale.clone())
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn test_insert_and_get() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));

        cache.insert("key1".to_string(), 100);
        assert_eq!(cache.get(&"key1".to_string()), Some(&100));
        assert_eq!(cache.get(&"key2".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_hides_but_retains() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));

        cache.insert("key1".to_string(), 100);
        time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get(&"key1".to_string()), None);
        assert_eq!(cache.peek_stale(&"key1".to_string()), Some(&100));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));

        cache.insert("old".to_string(), 1);
        time::advance(Duration::from_secs(40)).await;
        cache.insert("new".to_string(), 2);
        time::advance(Duration::from_secs(25)).await;

        // "old" is 65s old, "new" is 25s old.
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.get(&"new".to_string()), Some(&2));
        assert_eq!(cache.peek_stale(&"old".to_string()), None);

        // Idempotent.
        assert_eq!(cache.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_count() {
        let mut cache: TtlCache<String, i32> = TtlCache::new(Duration::from_secs(60));

        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.fresh_count(), 2);

        time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.fresh_count(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_skips_upstream_when_fresh() {
        let cache: SharedCache<String, i32> = SharedCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let value = cache
            .get_or_fetch("alice".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second call within TTL must not re-fetch.
        let value = cache
            .get_or_fetch("alice".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(8)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_stale_fallback() {
        let cache: SharedCache<String, i32> = SharedCache::new(Duration::from_secs(60));
        cache.insert("alice".to_string(), 7).await;

        time::advance(Duration::from_secs(61)).await;

        let value = cache
            .get_or_fetch("alice".to_string(), || async {
                Err(FeedError::RateLimited { retry_after: None })
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_propagates_without_fallback() {
        let cache: SharedCache<String, i32> = SharedCache::new(Duration::from_secs(60));

        let result = cache
            .get_or_fetch("missing".to_string(), || async {
                Err(FeedError::RateLimited { retry_after: None })
            })
            .await;
        assert!(matches!(result, Err(FeedError::RateLimited { .. })));
    }
}
