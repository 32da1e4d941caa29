//! Caching infrastructure for the analytics engine.
//!
//! Two tiers, both bounded in entry count and both expiring after a fixed
//! time-to-live:
//! - raw events per query range ([`AnalyticsCache::events`])
//! - computed analytics per query and data fingerprint ([`AnalyticsCache::results`])
//!
//! Eviction removes the oldest inserted entry. Ingesting new events clears
//! both tiers wholesale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::CacheConfig;

/// A cached value and when it was produced.
#[derive(Debug)]
struct CacheEntry<T> {
    /// The cached value.
    value: T,
    /// Production time.
    inserted_at: Instant,
    /// Insertion order (higher = newer).
    insert_order: u64,
}

/// Key-value cache with TTL expiry and oldest-first eviction.
#[derive(Debug)]
pub struct TtlCache<T> {
    /// Cache entries keyed by string key.
    entries: HashMap<String, CacheEntry<T>>,
    /// Global insertion counter for eviction order.
    insert_counter: u64,
    /// Maximum number of entries.
    max_entries: usize,
    /// Entry lifetime.
    ttl: Duration,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T> TtlCache<T> {
    /// Create a new cache with the specified limits.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            insert_counter: 0,
            max_entries,
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Get an entry if it exists and has not expired.
    ///
    /// Expired entries are dropped on access.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Insert a value, evicting the oldest entries when full.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        if self.max_entries == 0 {
            return;
        }
        let key = key.into();

        // Replacing an entry never needs an eviction
        if self.entries.remove(&key).is_none() {
            self.evict_if_needed();
        }

        self.insert_counter += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                insert_order: self.insert_counter,
            },
        );
    }

    /// Evict entries until there is room for one more.
    fn evict_if_needed(&mut self) {
        self.purge_expired();
        while self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
    }

    /// Evict the oldest inserted entry.
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.insert_order)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Clear all entries. Hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insert_counter = 0;
    }

    /// Number of entries, including ones that expired but were not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl.as_secs(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of entries.
    pub entry_count: usize,
    /// Maximum entries allowed.
    pub max_entries: usize,
    /// Entry lifetime in seconds.
    pub ttl_seconds: u64,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that missed or found an expired entry.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
}

impl CacheStats {
    /// Get usage as percentage.
    pub fn usage_percent(&self) -> f64 {
        if self.max_entries == 0 {
            return 0.0;
        }
        (self.entry_count as f64 / self.max_entries as f64) * 100.0
    }

    /// Share of lookups that hit, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.hits as f64 / total as f64) * 100.0
    }
}

/// Thread-safe [`TtlCache`] holding shared values.
pub struct SharedCache<T> {
    inner: RwLock<TtlCache<Arc<T>>>,
}

impl<T> SharedCache<T> {
    /// Create a new shared cache.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(TtlCache::new(max_entries, ttl)),
        }
    }

    /// Get a cached value.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        // Write lock: lookups update counters and drop expired entries
        self.inner.write().get(key).cloned()
    }

    /// Cache a value and hand back the shared handle.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.inner.write().insert(key, Arc::clone(&value));
        value
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Get statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.read().stats()
    }
}

impl<T> std::fmt::Debug for SharedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// The analytics engine's two cache tiers.
pub struct AnalyticsCache<E, R> {
    /// Raw events per range key.
    pub events: SharedCache<E>,
    /// Computed results per query/fingerprint key.
    pub results: SharedCache<R>,
    /// Whether caching is enabled.
    enabled: bool,
    /// Bumped on every invalidation.
    generation: AtomicU64,
}

impl<E, R> AnalyticsCache<E, R> {
    /// Create both tiers from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            events: SharedCache::new(config.max_entries, config.ttl()),
            results: SharedCache::new(config.max_entries, config.ttl()),
            enabled: config.enabled,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a disabled cache (no-op operations).
    pub fn disabled() -> Self {
        let config = CacheConfig {
            enabled: false,
            max_entries: 0,
            ..CacheConfig::default()
        };
        Self::new(&config)
    }

    /// Check if caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get cached events.
    pub fn get_events(&self, key: &str) -> Option<Arc<E>> {
        if self.enabled {
            self.events.get(key)
        } else {
            None
        }
    }

    /// Cache events, returning the shared handle either way.
    pub fn cache_events(&self, key: impl Into<String>, events: E) -> Arc<E> {
        if self.enabled {
            self.events.insert(key, events)
        } else {
            Arc::new(events)
        }
    }

    /// Get a cached result.
    pub fn get_result(&self, key: &str) -> Option<Arc<R>> {
        if self.enabled {
            self.results.get(key)
        } else {
            None
        }
    }

    /// Cache a result, returning the shared handle either way.
    pub fn cache_result(&self, key: impl Into<String>, result: R) -> Arc<R> {
        if self.enabled {
            self.results.insert(key, result)
        } else {
            Arc::new(result)
        }
    }

    /// Get a result from cache or compute it.
    ///
    /// A failed computation caches nothing.
    pub fn get_or_compute<F, Err>(&self, key: &str, compute: F) -> Result<Arc<R>, Err>
    where
        F: FnOnce() -> Result<R, Err>,
    {
        if let Some(result) = self.get_result(key) {
            return Ok(result);
        }
        let result = compute()?;
        Ok(self.cache_result(key, result))
    }

    /// Clear both tiers.
    pub fn invalidate_all(&self) {
        self.events.clear();
        self.results.clear();
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of invalidations so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Get combined statistics.
    pub fn stats(&self) -> AnalyticsCacheStats {
        AnalyticsCacheStats {
            enabled: self.enabled,
            generation: self.generation(),
            events: self.events.stats(),
            results: self.results.stats(),
        }
    }
}

impl<E, R> std::fmt::Debug for AnalyticsCache<E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsCache")
            .field("enabled", &self.enabled)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Combined cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsCacheStats {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Number of invalidations so far.
    pub generation: u64,
    /// Event tier stats.
    pub events: CacheStats,
    /// Result tier stats.
    pub results: CacheStats,
}

impl AnalyticsCacheStats {
    /// Get total entry count.
    pub fn total_entries(&self) -> usize {
        self.events.entry_count + self.results.entry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_basic_insert_get() {
        let mut cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        cache.insert("a", "alpha".to_string());

        assert_eq!(cache.get("a").map(String::as_str), Some("alpha"));
        assert!(cache.get("b").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_entries_expire() {
        let mut cache: TtlCache<u32> = TtlCache::new(10, Duration::from_millis(30));
        cache.insert("a", 1);
        assert_eq!(cache.get("a"), Some(&1));

        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_inserted_is_evicted() {
        let mut cache: TtlCache<u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("first", 1);
        cache.insert("second", 2);
        // Reading does not refresh insertion order
        assert_eq!(cache.get("first"), Some(&1));
        cache.insert("third", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("second"), Some(&2));
        assert_eq!(cache.get("third"), Some(&3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_replace_does_not_evict() {
        let mut cache: TtlCache<u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(&10));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let mut cache: TtlCache<u32> = TtlCache::new(0, Duration::from_secs(60));
        cache.insert("a", 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_analytics_cache_invalidation() {
        let cache: AnalyticsCache<Vec<u32>, u32> = AnalyticsCache::new(&CacheConfig::default());
        cache.cache_events("range", vec![1, 2, 3]);
        cache.cache_result("query", 6);

        assert_eq!(cache.get_events("range").as_deref(), Some(&vec![1, 2, 3]));
        assert_eq!(cache.get_result("query").as_deref(), Some(&6));

        cache.invalidate_all();
        assert!(cache.get_events("range").is_none());
        assert!(cache.get_result("query").is_none());
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.stats().total_entries(), 0);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let cache: AnalyticsCache<(), u32> = AnalyticsCache::new(&CacheConfig::default());

        let failed: Result<Arc<u32>, &str> = cache.get_or_compute("k", || Err("boom"));
        assert!(failed.is_err());
        assert!(cache.get_result("k").is_none());

        let mut calls = 0;
        for _ in 0..2 {
            let value: Result<Arc<u32>, &str> = cache.get_or_compute("k", || {
                calls += 1;
                Ok(7)
            });
            assert_eq!(*value.unwrap(), 7);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_disabled_cache() {
        let cache: AnalyticsCache<u32, u32> = AnalyticsCache::disabled();
        assert!(!cache.is_enabled());
        cache.cache_result("k", 1);
        assert!(cache.get_result("k").is_none());
    }
}
