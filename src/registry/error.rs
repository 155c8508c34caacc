use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown instance '{id}'")]
    UnknownInstance { id: String },

    #[error("instance '{id}' registered twice")]
    DuplicateInstance { id: String },

    #[error("primary instance '{id}' is not registered")]
    UnknownPrimary { id: String },

    #[error("registry has no instances")]
    Empty,

    #[error("invalid registry configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
