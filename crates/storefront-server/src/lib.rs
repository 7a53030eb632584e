pub mod config;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;
pub mod store;

use std::sync::Arc;

use storefront_cache::{HybridCache, LocalCache, RedisTier};

pub use config::{AppConfig, CacheConfig, LoggingConfig, RedisConfig, ServerConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, ServerBuilder, StorefrontServer, build_app};

/// Create the response cache from configuration.
///
/// When Redis is disabled or unreachable the returned cache runs in
/// local-only mode. Connection attempts are bounded: once the retry budget
/// is exhausted, either at startup or after a mid-flight failure, the Redis
/// tier stays disabled until the process restarts.
pub async fn create_cache(redis: &RedisConfig, cache: &CacheConfig) -> Arc<HybridCache> {
    let tier = match redis.tier_config().url {
        Some(_) => {
            tracing::info!("Connecting to Redis");
            RedisTier::connect(redis.tier_config()).await
        }
        None => {
            tracing::info!("Redis disabled, using local cache only");
            RedisTier::disabled()
        }
    };

    let hybrid = Arc::new(HybridCache::new(Arc::new(LocalCache::new()), tier));
    hybrid.start_sweeper(cache.sweep_interval());
    hybrid
}
