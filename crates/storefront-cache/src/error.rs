use std::time::Duration;
use thiserror::Error;

/// Errors raised by the Redis tier internals.
///
/// These never cross the cache boundary: the hybrid cache and the Redis tier
/// itself demote every variant to a neutral outcome (miss or no-op) before
/// returning to the caller. The type exists so the internals can use `?` and
/// log a single structured error at the demotion point.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to check out a connection from the pool.
    #[error("redis pool error: {0}")]
    Pool(String),

    /// A Redis command failed.
    #[error("redis command error: {0}")]
    Command(#[from] redis::RedisError),

    /// The bounded per-call timeout elapsed.
    #[error("redis operation timed out after {0:?}")]
    Timeout(Duration),

    /// The tier is not in the `Ready` state.
    #[error("redis tier unavailable")]
    Unavailable,
}
