use serde::{Deserialize, Serialize};

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl WebResult {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}
