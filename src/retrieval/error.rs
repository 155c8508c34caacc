use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("both search sides failed (vector: {vector}; lexical: {lexical})")]
    SearchFailed { vector: String, lexical: String },

    #[error("invalid retrieval configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
