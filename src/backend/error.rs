use thiserror::Error;

/// Errors surfaced by a single model-serving instance.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, reset mid-request.
    #[error("instance unreachable: {reason}")]
    Unreachable { reason: String },

    /// The instance answered with a non-success HTTP status.
    #[error("instance returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Credentials were rejected (HTTP 401/403).
    #[error("instance rejected credentials")]
    Unauthorized,

    /// The response body did not have the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// A token stream broke after it had been established.
    #[error("stream interrupted: {reason}")]
    Stream { reason: String },
}

impl BackendError {
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::MalformedResponse {
                reason: err.to_string(),
            }
        } else {
            BackendError::Unreachable {
                reason: err.to_string(),
            }
        }
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
