use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WebSearchError {
    #[error("web search unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("web search request failed: {reason}")]
    Request { reason: String },

    #[error("web search returned status {status}")]
    Status { status: u16 },

    #[error("web search timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed web search response: {reason}")]
    Malformed { reason: String },
}

impl From<reqwest::Error> for WebSearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WebSearchError::Malformed {
                reason: err.to_string(),
            }
        } else {
            WebSearchError::Request {
                reason: err.to_string(),
            }
        }
    }
}

pub type WebSearchResult<T> = Result<T, WebSearchError>;
