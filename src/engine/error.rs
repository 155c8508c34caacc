use thiserror::Error;

use crate::answer::AnswerError;
use crate::cache::CacheError;
use crate::confidence::ConfidenceError;
use crate::rerank::RerankError;
use crate::retrieval::RetrievalError;
use crate::routing::RoutingError;

/// Construction and option-validation errors. Answering itself never returns an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid answer options: {reason}")]
    InvalidOptions { reason: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    #[error(transparent)]
    Confidence(#[from] ConfidenceError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Answer(#[from] AnswerError),
}

pub type EngineResult<T> = Result<T, EngineError>;
