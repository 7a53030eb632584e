//! Best-effort Redis tier adapter.
//!
//! The adapter owns a deadpool connection pool and an explicit connection
//! state machine. Every operation is a silent no-op unless the state is
//! `Ready`; every remote failure is logged and converted into the
//! operation's neutral outcome (miss for reads, nothing for writes). A
//! remote failure must never become a request failure.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> Ready
//! Ready -> Reconnecting -> Ready            (transient network loss)
//! Reconnecting -> Disconnected              (retry budget exhausted)
//! any -> Closed                             (explicit shutdown)
//! ```
//!
//! Reconnection uses a capped backoff (`min(attempt * base, cap)`) with a
//! bounded attempt count; exhausting the budget leaves the tier unavailable
//! until process restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;
use serde::Serialize;

use crate::error::CacheError;
use crate::pattern::KeyPattern;
use crate::stats::TierStats;

/// Connection lifecycle state, owned exclusively by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Configuration for the Redis tier.
#[derive(Debug, Clone)]
pub struct RedisTierConfig {
    /// Connection URL. `None` means the tier never attempts a connection
    /// and stays permanently unavailable (pure local-cache mode).
    pub url: Option<String>,
    /// Namespace prefix applied to every key, so `clear` can scan-delete
    /// this tier's keys without touching unrelated data in the same DB.
    pub key_prefix: String,
    pub pool_size: usize,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    /// Maximum connection attempts before giving up until restart.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for RedisTierConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: "sf:".to_string(),
            pool_size: 16,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
            max_retries: 10,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(5),
        }
    }
}

struct Inner {
    pool: Option<Pool>,
    state: RwLock<ConnectionState>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Guards against more than one reconnect loop in flight.
    reconnecting: AtomicBool,
    config: RedisTierConfig,
}

/// Handle to the Redis tier. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct RedisTier {
    inner: Arc<Inner>,
}

impl RedisTier {
    /// Build the tier and attempt the initial connection.
    ///
    /// Never fails: a missing URL, a bad URL or an unreachable server all
    /// produce a tier that reports `is_available() == false`.
    pub async fn connect(config: RedisTierConfig) -> Self {
        let Some(url) = config.url.clone() else {
            tracing::info!("no Redis URL configured, running in local-only cache mode");
            return Self::offline(config);
        };

        let mut pool_cfg = deadpool_redis::Config::from_url(&url);
        let mut pool_opts = pool_cfg.pool.unwrap_or_default();
        pool_opts.max_size = config.pool_size;
        pool_opts.timeouts.wait = Some(config.operation_timeout);
        pool_opts.timeouts.create = Some(config.connect_timeout);
        pool_opts.timeouts.recycle = Some(config.operation_timeout);
        pool_cfg.pool = Some(pool_opts);

        let pool = match pool_cfg.create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create Redis pool, cache tier disabled");
                return Self::offline(config);
            }
        };

        let tier = Self {
            inner: Arc::new(Inner {
                pool: Some(pool),
                state: RwLock::new(ConnectionState::Connecting),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                config,
            }),
        };

        if tier.try_establish().await {
            tier.set_state(ConnectionState::Ready);
            tracing::info!(url = %url, "connected to Redis");
        } else {
            tier.set_state(ConnectionState::Disconnected);
            tracing::warn!(url = %url, "could not reach Redis, cache tier disabled until restart");
        }
        tier
    }

    /// A tier that never connects. Equivalent to `connect` with no URL.
    pub fn disabled() -> Self {
        Self::offline(RedisTierConfig::default())
    }

    fn offline(config: RedisTierConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool: None,
                state: RwLock::new(ConnectionState::Disconnected),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                config,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self
            .inner
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self
            .inner
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state != next {
            tracing::debug!(from = %*state, to = %next, "redis tier state change");
            *state = next;
        }
    }

    /// True iff the state machine is in `Ready`.
    pub fn is_available(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn stats(&self) -> TierStats {
        TierStats::new(
            0,
            self.inner.hits.load(Ordering::Relaxed),
            self.inner.misses.load(Ordering::Relaxed),
        )
    }

    /// Reset hit/miss counters (used by `clear`).
    pub fn reset_stats(&self) {
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.inner.config.key_prefix)
    }

    /// Fetch a value. Unavailable tier, remote error or timeout all read as
    /// absent.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if !self.is_available() {
            return None;
        }
        match self.try_get(&self.namespaced(key)).await {
            Ok(Some(data)) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "redis cache hit");
                Some(data)
            }
            Ok(None) => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                self.on_error("GET", key, &e);
                None
            }
        }
    }

    /// Write a value with server-side expiry. Failures are logged and
    /// dropped.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        if !self.is_available() {
            return;
        }
        // Redis rejects a zero expiry; a zero-TTL entry is dead on arrival
        // anyway, so skip the write.
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return;
        }
        if let Err(e) = self.try_set(&self.namespaced(key), value, ttl_secs).await {
            self.on_error("SET", key, &e);
        }
    }

    /// Delete a key. Failures are logged and dropped.
    pub async fn delete(&self, key: &str) {
        if !self.is_available() {
            return;
        }
        if let Err(e) = self.try_delete(&self.namespaced(key)).await {
            self.on_error("DEL", key, &e);
        }
    }

    /// Delete every key matching the pattern using cursor-based SCAN and
    /// batched DEL calls, so large key spaces never block the server.
    ///
    /// Returns the number of keys deleted (best-effort).
    pub async fn delete_pattern(&self, pattern: &KeyPattern) -> usize {
        if !self.is_available() {
            return 0;
        }
        let match_expr = format!(
            "{}{}",
            escape_prefix(&self.inner.config.key_prefix),
            pattern.redis_match()
        );
        match self.try_delete_pattern(&match_expr).await {
            Ok(count) => {
                tracing::debug!(pattern = %pattern, count, "redis pattern delete");
                count
            }
            Err(e) => {
                self.on_error("SCAN", &match_expr, &e);
                0
            }
        }
    }

    /// Delete every key in this tier's namespace and reset counters.
    pub async fn clear(&self) {
        self.reset_stats();
        if !self.is_available() {
            return;
        }
        let match_expr = format!("{}*", escape_prefix(&self.inner.config.key_prefix));
        if let Err(e) = self.try_delete_pattern(&match_expr).await {
            self.on_error("SCAN", &match_expr, &e);
        }
    }

    /// Shut the tier down. All subsequent operations are no-ops.
    pub async fn close(&self) {
        self.set_state(ConnectionState::Closed);
        if let Some(pool) = &self.inner.pool {
            pool.close();
        }
        tracing::info!("redis cache tier closed");
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, CacheError> {
        let pool = self.inner.pool.as_ref().ok_or(CacheError::Unavailable)?;
        let timeout = self.inner.config.operation_timeout;
        tokio::time::timeout(timeout, pool.get())
            .await
            .map_err(|_| CacheError::Timeout(timeout))?
            .map_err(|e| CacheError::Pool(e.to_string()))
    }

    async fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn().await?;
        let timeout = self.inner.config.operation_timeout;
        let value = tokio::time::timeout(timeout, conn.get::<_, Option<Vec<u8>>>(key))
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;
        Ok(value)
    }

    async fn try_set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let timeout = self.inner.config.operation_timeout;
        tokio::time::timeout(timeout, conn.set_ex::<_, _, ()>(key, value, ttl_secs))
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let timeout = self.inner.config.operation_timeout;
        tokio::time::timeout(timeout, conn.del::<_, ()>(key))
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;
        Ok(())
    }

    async fn try_delete_pattern(&self, match_expr: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn().await?;
        let timeout = self.inner.config.operation_timeout;
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = tokio::time::timeout(
                timeout,
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(match_expr)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn),
            )
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;

            if !keys.is_empty() {
                deleted += keys.len();
                tokio::time::timeout(timeout, conn.del::<_, ()>(keys))
                    .await
                    .map_err(|_| CacheError::Timeout(timeout))??;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(deleted)
    }

    /// Initial connection attempt loop with capped backoff.
    async fn try_establish(&self) -> bool {
        let config = &self.inner.config;
        for attempt in 1..=config.max_retries {
            match self.ping().await {
                Ok(()) => return true,
                Err(e) => {
                    let delay = backoff_delay(attempt, config);
                    tracing::warn!(
                        attempt,
                        max_retries = config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Redis connection attempt failed"
                    );
                    if attempt < config.max_retries {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        false
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let timeout = self.inner.config.connect_timeout;
        tokio::time::timeout(timeout, redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;
        Ok(())
    }

    /// Handle a remote failure: log it and, if the tier was `Ready`, kick
    /// off a single background reconnect loop.
    fn on_error(&self, op: &str, key: &str, error: &CacheError) {
        tracing::warn!(op, key = %key, error = %error, "redis operation failed");
        if self.state() != ConnectionState::Ready {
            return;
        }
        if self.inner.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_state(ConnectionState::Reconnecting);

        let tier = self.clone();
        tokio::spawn(async move {
            let recovered = tier.try_establish().await;
            // close() may have run while we were retrying.
            if tier.state() == ConnectionState::Reconnecting {
                if recovered {
                    tier.set_state(ConnectionState::Ready);
                    tracing::info!("Redis connection recovered");
                } else {
                    tier.set_state(ConnectionState::Disconnected);
                    tracing::warn!("Redis retry budget exhausted, cache tier disabled until restart");
                }
            }
            tier.inner.reconnecting.store(false, Ordering::SeqCst);
        });
    }
}

/// Backoff for the n-th attempt: `min(attempt * base, cap)`.
fn backoff_delay(attempt: u32, config: &RedisTierConfig) -> Duration {
    let scaled = config.retry_base_delay.saturating_mul(attempt);
    scaled.min(config.retry_max_delay)
}

/// Escape Redis glob metacharacters in the namespace prefix.
fn escape_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_url_means_permanently_unavailable() {
        let tier = RedisTier::connect(RedisTierConfig::default()).await;
        assert_eq!(tier.state(), ConnectionState::Disconnected);
        assert!(!tier.is_available());
    }

    #[tokio::test]
    async fn operations_are_noops_when_unavailable() {
        let tier = RedisTier::connect(RedisTierConfig::default()).await;

        tier.set("k", b"v", Duration::from_secs(60)).await;
        assert_eq!(tier.get("k").await, None);
        tier.delete("k").await;
        assert_eq!(
            tier.delete_pattern(&KeyPattern::Prefix("/api/".into()))
                .await,
            0
        );

        // Neutral no-ops are not counted as traffic.
        let stats = tier.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn unreachable_server_degrades_to_disconnected() {
        let config = RedisTierConfig {
            url: Some("redis://127.0.0.1:1".to_string()),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(20),
            connect_timeout: Duration::from_millis(200),
            operation_timeout: Duration::from_millis(200),
            ..RedisTierConfig::default()
        };
        let tier = RedisTier::connect(config).await;
        assert_eq!(tier.state(), ConnectionState::Disconnected);
        assert!(!tier.is_available());
        assert_eq!(tier.get("k").await, None);
    }

    #[tokio::test]
    async fn close_moves_to_closed() {
        let tier = RedisTier::connect(RedisTierConfig::default()).await;
        tier.close().await;
        assert_eq!(tier.state(), ConnectionState::Closed);
        assert!(!tier.is_available());
    }

    #[test]
    fn backoff_is_capped() {
        let config = RedisTierConfig {
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(5),
            ..RedisTierConfig::default()
        };
        assert_eq!(backoff_delay(1, &config), Duration::from_millis(500));
        assert_eq!(backoff_delay(4, &config), Duration::from_secs(2));
        assert_eq!(backoff_delay(100, &config), Duration::from_secs(5));
    }
}
