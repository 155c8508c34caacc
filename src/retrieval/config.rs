use std::time::Duration;

use super::error::{RetrievalError, RetrievalResult};
use crate::constants::{
    DEFAULT_LEXICAL_WEIGHT, DEFAULT_MIN_VECTOR_SIMILARITY, DEFAULT_RETRIEVAL_TOP_N,
    DEFAULT_SEARCH_TIMEOUT_MS, DEFAULT_VECTOR_WEIGHT,
};

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Hits requested from each search side.
    pub top_n: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
    /// Vector hits below this cosine similarity are dropped before fusion.
    pub min_vector_similarity: f32,
    pub search_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_RETRIEVAL_TOP_N,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            min_vector_similarity: DEFAULT_MIN_VECTOR_SIMILARITY,
            search_timeout: Duration::from_millis(DEFAULT_SEARCH_TIMEOUT_MS),
        }
    }
}

impl RetrievalConfig {
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn weights(mut self, vector: f32, lexical: f32) -> Self {
        self.vector_weight = vector;
        self.lexical_weight = lexical;
        self
    }

    pub fn min_vector_similarity(mut self, min: f32) -> Self {
        self.min_vector_similarity = min;
        self
    }

    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn validate(&self) -> RetrievalResult<()> {
        if self.top_n == 0 {
            return Err(RetrievalError::InvalidConfig {
                reason: "top_n must be at least 1".to_string(),
            });
        }
        let weights_ok = [self.vector_weight, self.lexical_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        if !weights_ok || self.vector_weight + self.lexical_weight <= 0.0 {
            return Err(RetrievalError::InvalidConfig {
                reason: format!(
                    "weights must be non-negative with a positive sum, got {}/{}",
                    self.vector_weight, self.lexical_weight
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.min_vector_similarity) {
            return Err(RetrievalError::InvalidConfig {
                reason: format!(
                    "min_vector_similarity must be in [0, 1], got {}",
                    self.min_vector_similarity
                ),
            });
        }
        if self.search_timeout.is_zero() {
            return Err(RetrievalError::InvalidConfig {
                reason: "search_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
