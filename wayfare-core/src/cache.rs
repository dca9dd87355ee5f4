//! Shared time-bounded cache.
//!
//! Entries past their expiry are not dropped: the resolver still serves them
//! when every provider fails. Time comes from `tokio::time::Instant`.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub expires_at: Instant,
    last_used: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent map from normalized query to the last good snapshot.
///
/// Unbounded unless built with [`TtlCache::with_capacity`], in which case the
/// least recently used entry is evicted on overflow.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    capacity: Option<usize>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self { entries: DashMap::new(), capacity: None }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: DashMap::new(), capacity: Some(capacity.max(1)) }
    }

    /// Returns the entry for `key`, fresh or stale.
    pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        // recency only matters when there is a capacity to enforce
        if self.capacity.is_none() {
            return self.entries.get(key).map(|entry| entry.value().clone());
        }

        self.entries.get_mut(key).map(|mut entry| {
            entry.last_used = Instant::now();
            entry.clone()
        })
    }

    /// Overwrites the entry for `key`; it stays fresh for `ttl`.
    pub fn insert(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);

        self.entries.insert(
            key.clone(),
            CacheEntry { key: key.clone(), value, expires_at, last_used: now },
        );

        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                if !self.evict_least_recent(&key) {
                    break;
                }
            }
        }
    }

    pub fn evict(&self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_least_recent(&self, keep: &str) -> bool {
        let victim = self
            .entries
            .iter()
            .filter(|entry| entry.key() != keep)
            .min_by_key(|entry| entry.last_used)
            .map(|entry| entry.key().clone());

        match victim {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
