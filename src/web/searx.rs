use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::WebSearch;
use super::error::{WebSearchError, WebSearchResult};
use super::types::WebResult;

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// SearxNG JSON API (`GET /search?q=...&format=json`).
pub struct HttpWebSearch {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpWebSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> WebSearchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl WebSearch for HttpWebSearch {
    fn name(&self) -> &str {
        &self.base_url
    }

    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }

    #[instrument(skip(self, query), fields(url = %self.base_url))]
    async fn search(&self, query: &str, max_results: usize) -> WebSearchResult<Vec<WebResult>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WebSearchError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    WebSearchError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebSearchError::Status {
                status: status.as_u16(),
            });
        }

        let body: SearxResponse = response.json().await?;
        let results: Vec<WebResult> = body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty() && !(r.title.is_empty() && r.content.is_empty()))
            .take(max_results)
            .map(|r| WebResult {
                title: r.title,
                snippet: r.content,
                url: r.url,
            })
            .collect();
        debug!(results = results.len(), "web search complete");
        Ok(results)
    }
}

impl std::fmt::Debug for HttpWebSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWebSearch")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stand-in when no web search is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str, _max_results: usize) -> WebSearchResult<Vec<WebResult>> {
        Err(WebSearchError::Unavailable {
            reason: "web search is disabled".to_string(),
        })
    }
}
