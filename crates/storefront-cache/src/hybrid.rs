//! Two-tier hybrid cache.
//!
//! Composes the local tier and the Redis tier behind a single interface.
//! The Redis tier is the shared, preferred source for reads; the local tier
//! is the guaranteed fallback. Loss of Redis is never a correctness failure,
//! only a hit-rate regression.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::local::LocalCache;
use crate::pattern::KeyPattern;
use crate::redis::RedisTier;
use crate::stats::CacheStats;

/// TTL used when promoting a Redis hit into the local tier. Kept short so a
/// missed invalidation on this instance is bounded by a small staleness
/// window rather than the entry's full remote TTL.
const PROMOTION_TTL: Duration = Duration::from_secs(60);

/// Single cache facade over the local and Redis tiers.
///
/// Constructed once at application startup and shared via `Arc`; the owner
/// is responsible for calling [`HybridCache::close`] at shutdown.
pub struct HybridCache {
    local: Arc<LocalCache>,
    redis: RedisTier,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HybridCache {
    pub fn new(local: Arc<LocalCache>, redis: RedisTier) -> Self {
        Self {
            local,
            redis,
            sweeper: Mutex::new(None),
        }
    }

    /// Construct a cache with no distributed tier (tests, local dev).
    pub fn local_only() -> Self {
        Self::new(Arc::new(LocalCache::new()), RedisTier::disabled())
    }

    /// Start the local tier's background sweep. Idempotent owner-side call;
    /// a second invocation replaces the previous sweeper.
    pub fn start_sweeper(&self, interval: Duration) {
        let handle = self.local.spawn_sweeper(interval);
        let mut guard = self
            .sweeper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }

    /// Read a value, preferring the Redis tier and falling back to local.
    ///
    /// A Redis hit is promoted into the local tier so this instance keeps
    /// serving the entry if Redis becomes unavailable.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if self.redis.is_available() {
            if let Some(data) = self.redis.get(key).await {
                let data = Arc::new(data);
                self.local
                    .set_shared(key, Arc::clone(&data), PROMOTION_TTL);
                return Some(data);
            }
        }
        self.local.get(key)
    }

    /// Write to both tiers: local synchronously (guaranteed), Redis
    /// best-effort. A Redis failure never fails the overall set.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let data = Arc::new(value);
        self.local.set_shared(key, Arc::clone(&data), ttl);
        self.redis.set(key, &data, ttl).await;
    }

    /// Remove a key from both tiers.
    pub async fn delete(&self, key: &str) {
        self.local.delete(key);
        self.redis.delete(key).await;
    }

    /// Remove matching keys from both tiers. Returns the combined count
    /// (the Redis count is best-effort).
    pub async fn delete_pattern(&self, pattern: &KeyPattern) -> usize {
        let local = self.local.delete_pattern(pattern);
        let remote = self.redis.delete_pattern(pattern).await;
        if local == 0 && remote == 0 {
            tracing::debug!(pattern = %pattern, "pattern delete matched no keys");
        }
        local + remote
    }

    /// Clear both tiers and reset their counters.
    pub async fn clear(&self) {
        self.local.clear();
        self.redis.clear().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            active_cache: if self.redis.is_available() {
                "redis"
            } else {
                "memory"
            },
            memory: self.local.stats(),
            redis: self.redis.stats(),
            redis_state: self.redis.state(),
        }
    }

    /// Shut down the distributed tier and stop the sweeper.
    pub async fn close(&self) {
        let handle = {
            let mut guard = self
                .sweeper
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        self.redis.close().await;
    }
}
