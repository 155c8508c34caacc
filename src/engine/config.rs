use std::time::Duration;

use super::error::{EngineError, EngineResult};
use crate::constants::{DEFAULT_REQUEST_DEADLINE_MS, DEFAULT_WEB_MAX_RESULTS, DEFAULT_WEB_TIMEOUT_MS};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget for one `answer` call, every stage included.
    pub deadline: Duration,
    pub web_max_results: usize,
    pub web_timeout: Duration,
    /// Whether generated answers are stored in and served from the semantic cache.
    pub cache_answers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(DEFAULT_REQUEST_DEADLINE_MS),
            web_max_results: DEFAULT_WEB_MAX_RESULTS,
            web_timeout: Duration::from_millis(DEFAULT_WEB_TIMEOUT_MS),
            cache_answers: true,
        }
    }
}

impl EngineConfig {
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn web_max_results(mut self, n: usize) -> Self {
        self.web_max_results = n;
        self
    }

    pub fn web_timeout(mut self, timeout: Duration) -> Self {
        self.web_timeout = timeout;
        self
    }

    pub fn cache_answers(mut self, enabled: bool) -> Self {
        self.cache_answers = enabled;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.deadline.is_zero() {
            return Err(EngineError::InvalidConfig {
                reason: "deadline must be non-zero".to_string(),
            });
        }
        if self.web_timeout.is_zero() {
            return Err(EngineError::InvalidConfig {
                reason: "web_timeout must be non-zero".to_string(),
            });
        }
        if self.web_max_results == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "web_max_results must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
