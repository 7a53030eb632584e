use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use storefront_cache::RedisTierConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration (distributed cache tier)
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.max_retries == 0 {
            return Err("redis.max_retries must be > 0".into());
        }
        if self.redis.enabled
            && self.redis.url.as_deref().is_some_and(|u| !u.starts_with("redis://") && !u.starts_with("rediss://"))
        {
            return Err("redis.url must start with redis:// or rediss://".into());
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err("cache.sweep_interval_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration for the distributed cache tier.
///
/// The tier degrades gracefully: a missing URL, `enabled = false` or an
/// unreachable server all leave the application in local-only cache mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the Redis tier (gracefully degrades without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379").
    /// When absent, the Redis tier never attempts a connection.
    #[serde(default)]
    pub url: Option<String>,

    /// Namespace prefix for this application's keys
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection attempt timeout in milliseconds
    #[serde(default = "default_redis_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-operation timeout in milliseconds
    #[serde(default = "default_redis_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Maximum connection attempts before giving up until restart
    #[serde(default = "default_redis_max_retries")]
    pub max_retries: u32,

    /// Base delay for the capped retry backoff, in milliseconds
    #[serde(default = "default_redis_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_redis_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_key_prefix() -> String {
    "sf:".to_string()
}

fn default_redis_pool_size() -> usize {
    16
}

fn default_redis_connect_timeout_ms() -> u64 {
    5000
}

fn default_redis_operation_timeout_ms() -> u64 {
    2000
}

fn default_redis_max_retries() -> u32 {
    10
}

fn default_redis_retry_base_delay_ms() -> u64 {
    500
}

fn default_redis_retry_max_delay_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: None,
            key_prefix: default_redis_key_prefix(),
            pool_size: default_redis_pool_size(),
            connect_timeout_ms: default_redis_connect_timeout_ms(),
            operation_timeout_ms: default_redis_operation_timeout_ms(),
            max_retries: default_redis_max_retries(),
            retry_base_delay_ms: default_redis_retry_base_delay_ms(),
            retry_max_delay_ms: default_redis_retry_max_delay_ms(),
        }
    }
}

impl RedisConfig {
    /// Translate to the cache crate's tier configuration. Disabling the
    /// tier is expressed as an absent URL.
    pub fn tier_config(&self) -> RedisTierConfig {
        RedisTierConfig {
            url: if self.enabled { self.url.clone() } else { None },
            key_prefix: self.key_prefix.clone(),
            pool_size: self.pool_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Cache behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Interval between background sweeps of expired local entries, seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("storefront.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., STOREFRONT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.redis.url.is_none());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_redis_url_scheme_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.redis.url = Some("http://localhost:6379".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn disabling_redis_clears_the_tier_url() {
        let cfg = RedisConfig {
            enabled: false,
            url: Some("redis://localhost:6379".into()),
            ..RedisConfig::default()
        };
        assert!(cfg.tier_config().url.is_none());
    }

    #[test]
    fn toml_round_trip() {
        let toml_src = r#"
            [server]
            port = 9090

            [redis]
            url = "redis://cache.internal:6379"
            pool_size = 4

            [cache]
            sweep_interval_secs = 30
        "#;
        let cfg: AppConfig = toml::from_str(toml_src).expect("parse");
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.redis.pool_size, 4);
        assert_eq!(cfg.redis.url.as_deref(), Some("redis://cache.internal:6379"));
        assert_eq!(cfg.cache.sweep_interval_secs, 30);
        assert!(cfg.validate().is_ok());
    }
}
