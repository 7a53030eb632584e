//! Process-local cache tier with TTL support.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::pattern::KeyPattern;
use crate::stats::TierStats;

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` to allow cheap cloning on cache hits,
/// avoiding copies of potentially large response bodies.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(data: Arc<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// A zero TTL means the entry is expired from the moment it is stored.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_zero() || self.cached_at.elapsed() >= self.ttl
    }
}

/// In-memory key-value store with per-entry TTL, lazy eviction on reads and
/// a periodic sweep for entries that are never read again.
///
/// Writes are last-write-wins with no version check; entries are always
/// re-derivable from the source of truth, so lost updates are harmless.
pub struct LocalCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a live value. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.data));
            }
            drop(entry);
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value, replacing any existing entry for the key.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.set_shared(key, Arc::new(value), ttl);
    }

    /// Store an already-shared value without copying the payload.
    pub fn set_shared(&self, key: &str, value: Arc<Vec<u8>>, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    /// Remove an entry if present. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key matches the pattern.
    ///
    /// Returns the number of entries removed; zero matches is not an error.
    pub fn delete_pattern(&self, pattern: &KeyPattern) -> usize {
        let matched: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| pattern.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in &matched {
            self.entries.remove(key);
        }

        tracing::debug!(pattern = %pattern, count = matched.len(), "local cache pattern delete");
        matched.len()
    }

    /// Remove all entries and reset hit/miss counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> TierStats {
        TierStats::new(
            self.entries.len(),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Remove expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    /// Spawn a background task that sweeps expired entries on a fixed
    /// interval. Without the sweep, keys that are set once and never read
    /// again would accumulate until process restart.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "local cache sweep");
                }
            }
        })
    }
}
