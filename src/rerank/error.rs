use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RerankError {
    #[error("rerank backend failed: {reason}")]
    Backend { reason: String },

    #[error("rerank backend returned {actual} scores for {expected} passages")]
    ScoreCount { expected: usize, actual: usize },

    #[error("rerank timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("invalid rerank configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<reqwest::Error> for RerankError {
    fn from(err: reqwest::Error) -> Self {
        RerankError::Backend {
            reason: err.to_string(),
        }
    }
}

pub type RerankResult<T> = Result<T, RerankError>;
