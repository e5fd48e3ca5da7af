//! Query Cache Module
//!
//! Provides caching for:
//! - Compiled queries (decomposed/planned operator trees, keyed by the raw
//!   SPARQL string)
//! - Query results (keyed by the raw SPARQL string plus the federation's
//!   configuration generation, so a `/configure` reload invalidates stale
//!   entries implicitly by changing the key)
//!
//! ## Design
//!
//! LRU eviction bounded by `max_cache_entries`; each entry additionally
//! expires after its TTL regardless of recency.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    inserted_at: Instant,
    last_used: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A bounded, TTL-aware cache keyed by `String` (raw query text, typically).
#[derive(Debug)]
pub struct QueryCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    max_entries: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        QueryCache {
            entries: HashMap::new(),
            max_entries,
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<T> {
        let expired = self.entries.get(key).is_some_and(|e| e.is_expired(self.ttl));
        if expired {
            self.entries.remove(key);
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = Instant::now();
                self.stats.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: String, value: T) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_lru();
        }
        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                last_used: now,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest);
            self.stats.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_hits() {
        let mut cache = QueryCache::new(4, Duration::from_secs(60));
        cache.put("q1".into(), 42);
        assert_eq!(cache.get("q1"), Some(42));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let mut cache: QueryCache<u32> = QueryCache::new(4, Duration::from_secs(60));
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut cache = QueryCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.get("a");
        cache.put("c".into(), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let mut cache = QueryCache::new(4, Duration::from_millis(0));
        cache.put("q".into(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("q"), None);
    }
}
