use std::time::Duration;

use crate::constants::{DEFAULT_EMBED_TIMEOUT_MS, DEFAULT_GENERATE_TIMEOUT_MS, DEFAULT_MAX_ATTEMPTS};

/// Retry and timeout policy of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound on attempts per logical request, each against a distinct instance.
    pub max_attempts: usize,
    pub embed_timeout: Duration,
    /// Applies to `generate` and to establishing a `generate_stream`.
    pub generate_timeout: Duration,
    /// Try the primary instance once when no instance is eligible.
    pub fallback_to_primary: bool,
    /// Reject embeddings of any other length.
    pub expected_dimension: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            embed_timeout: Duration::from_millis(DEFAULT_EMBED_TIMEOUT_MS),
            generate_timeout: Duration::from_millis(DEFAULT_GENERATE_TIMEOUT_MS),
            fallback_to_primary: true,
            expected_dimension: None,
        }
    }
}

impl DispatchConfig {
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub fn fallback_to_primary(mut self, enabled: bool) -> Self {
        self.fallback_to_primary = enabled;
        self
    }

    pub fn expected_dimension(mut self, dim: usize) -> Self {
        self.expected_dimension = Some(dim);
        self
    }
}
