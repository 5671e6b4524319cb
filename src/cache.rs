//! # TTL Cache Module
//!
//! A small cache-aside store: every entry remembers when it was written and
//! is evicted on the first read after its time-to-live has passed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Thread-safe key/value cache with a single expiry policy
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
}

/// Snapshot used by `/status` and `/refresh`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_secs: u64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a fresh value, evicting the entry if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        let fresh = entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.inserted_at) < self.ttl)?;

        if fresh {
            entries.get(key).map(|entry| entry.value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key, value, Instant::now());
    }

    pub fn set_at(&self, key: impl Into<String>, value: V, now: Instant) {
        self.lock().insert(
            key.into(),
            Entry {
                value,
                inserted_at: now,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Remove all expired entries; returns the number evicted
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_is_returned() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("database_context", "stats".to_string());
        assert_eq!(cache.get("database_context").as_deref(), Some("stats"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let written = Instant::now();
        cache.set_at("k", 1u32, written);

        assert_eq!(cache.get_at("k", written + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at("k", written + Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.set("k", 1u8);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.stats(), CacheStats { entries: 2, ttl_secs: 300 });
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_purge_expired_keeps_fresh_entries() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let start = Instant::now();
        cache.set_at("old", 1, start);
        cache.set_at("new", 2, start + Duration::from_secs(350));

        let later = start + Duration::from_secs(400);
        assert_eq!(cache.purge_expired_at(later), 1);
        assert_eq!(cache.get_at("new", later), Some(2));
    }
}
