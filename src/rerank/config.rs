use std::time::Duration;

use super::error::{RerankError, RerankResult};
use crate::constants::{DEFAULT_RERANK_TIMEOUT_MS, DEFAULT_RERANK_TOP_K};

#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Only the first `top_k` fused candidates are rescored.
    pub top_k: usize,
    pub timeout: Duration,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_RERANK_TOP_K,
            timeout: Duration::from_millis(DEFAULT_RERANK_TIMEOUT_MS),
        }
    }
}

impl RerankConfig {
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> RerankResult<()> {
        if self.top_k == 0 {
            return Err(RerankError::InvalidConfig {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(RerankError::InvalidConfig {
                reason: "timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
