use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Refused at insert time so a corrupt vector never enters the cache.
    #[error("invalid embedding: {reason}")]
    InvalidEmbedding { reason: String },

    #[error("invalid cache configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
