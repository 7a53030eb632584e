use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named TTL tiers for cacheable routes.
///
/// Call sites pick a tier by name instead of a raw duration so that TTL
/// policy stays consistent across route registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlTier {
    /// 5 minutes — volatile listings (e.g. cart contents).
    Short,
    /// 15 minutes — paginated catalog queries.
    Medium,
    /// 1 hour — individual resources that change rarely.
    Long,
    /// 24 hours — near-static data (e.g. category tree).
    VeryLong,
}

impl TtlTier {
    pub fn duration(self) -> Duration {
        match self {
            TtlTier::Short => Duration::from_secs(5 * 60),
            TtlTier::Medium => Duration::from_secs(15 * 60),
            TtlTier::Long => Duration::from_secs(60 * 60),
            TtlTier::VeryLong => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for TtlTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtlTier::Short => write!(f, "short"),
            TtlTier::Medium => write!(f, "medium"),
            TtlTier::Long => write!(f, "long"),
            TtlTier::VeryLong => write!(f, "very_long"),
        }
    }
}
