use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfidenceError {
    #[error("invalid confidence configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type ConfidenceResult<T> = Result<T, ConfidenceError>;
