use thiserror::Error;

use crate::dispatch::DispatchError;

#[derive(Debug, Clone, Error)]
pub enum AnswerError {
    #[error("generation failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("invalid answer configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type AnswerResult<T> = Result<T, AnswerError>;
