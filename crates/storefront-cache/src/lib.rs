//! Hybrid two-tier response cache for the storefront API.
//!
//! ## Architecture
//!
//! - **Local tier (DashMap)**: in-memory, microsecond latency, per-instance
//! - **Redis tier**: network, millisecond latency, shared across instances
//!
//! Reads prefer the Redis tier (the shared source of cached truth) and fall
//! back to the local tier; writes always land in the local tier and are
//! mirrored to Redis best-effort. A Redis outage degrades the system to
//! local-only operation, never to an error surfaced to request handling.
//!
//! ## Graceful Degradation
//!
//! The Redis tier tracks its own connection state. When it is anything other
//! than `Ready`, every remote operation is a silent no-op and the hybrid
//! cache serves from the local tier alone.

pub mod error;
pub mod hybrid;
pub mod key;
pub mod local;
pub mod pattern;
pub mod redis;
pub mod stats;
pub mod ttl;

pub use error::CacheError;
pub use hybrid::HybridCache;
pub use key::request_cache_key;
pub use local::{CacheEntry, LocalCache};
pub use pattern::KeyPattern;
pub use redis::{ConnectionState, RedisTier, RedisTierConfig};
pub use stats::{CacheStats, TierStats};
pub use ttl::TtlTier;
