use std::time::Duration;

use super::error::{CacheError, CacheResult};
use crate::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_SIMILARITY_THRESHOLD, DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_MEMO_CAPACITY,
};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Minimum cosine similarity for a semantic hit.
    pub similarity_threshold: f32,
    /// Hard upper bound on semantic entries.
    pub capacity: usize,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    /// Capacity of the exact-match embedding memo.
    pub memo_capacity: u64,
    pub memo_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_CACHE_SIMILARITY_THRESHOLD,
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            memo_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CacheError::InvalidConfig {
                reason: format!(
                    "similarity_threshold must be in [0, 1], got {}",
                    self.similarity_threshold
                ),
            });
        }
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "capacity must be at least 1".to_string(),
            });
        }
        if self.ttl.is_zero() || self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig {
                reason: "ttl and sweep_interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
