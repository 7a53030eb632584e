use serde::Serialize;

use crate::redis::ConnectionState;

/// Hit/miss statistics for a single cache tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierStats {
    /// Number of entries currently held (always 0 for the Redis tier, which
    /// owns no local state).
    pub size: usize,
    /// Number of cache hits since the last clear.
    pub hits: u64,
    /// Number of cache misses since the last clear.
    pub misses: u64,
    /// hits / (hits + misses), 0.0 when no requests have been recorded.
    pub hit_rate: f64,
}

impl TierStats {
    pub fn new(size: usize, hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        Self {
            size,
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Combined statistics for the hybrid cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Which tier currently serves as the primary: "redis" when the
    /// distributed tier is available, otherwise "memory".
    pub active_cache: &'static str,
    pub memory: TierStats,
    pub redis: TierStats,
    pub redis_state: ConnectionState,
}
