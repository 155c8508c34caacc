use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SLUICE_CACHE_HEADER: &str = "X-Sluice-Cache";

/// How a request was served with respect to the answer cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    HitSemantic,
    Miss,
    /// Streaming requests never consult the answer cache.
    Bypass,
}

impl CacheStatus {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::HitSemantic => "HIT_SEMANTIC",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::HitSemantic)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}

/// One semantic cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub id: u64,
    pub query_embedding: Vec<f32>,
    pub normalized_query: String,
    pub payload: T,
    /// Fingerprint of the request options; only equal variants match.
    pub variant: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Eviction value: `hit_count / (1 + minutes since last access)`. Lowest is evicted.
    pub fn value(&self, now: DateTime<Utc>) -> f64 {
        let idle_minutes = (now - self.last_accessed_at).num_milliseconds().max(0) as f64 / 60_000.0;
        self.hit_count as f64 / (1.0 + idle_minutes)
    }
}

/// A semantic hit, with enough provenance to explain it.
#[derive(Debug, Clone)]
pub struct CacheHit<T> {
    pub entry_id: u64,
    pub payload: T,
    pub similarity: f32,
    /// Normalized text of the query that produced the cached payload.
    pub matched_query: String,
    /// Hit count including this hit.
    pub hit_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub corruptions: u64,
}
