use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::RerankBackend;
use super::error::{RerankError, RerankResult};

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    raw_scores: bool,
}

#[derive(Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// Cross-encoder served over a text-embeddings-inference style `POST /rerank` endpoint.
pub struct HttpRerankBackend {
    client: Client,
    base_url: String,
    /// Pass raw logits through a sigmoid. Enable when the server returns unnormalized scores.
    apply_sigmoid: bool,
}

impl HttpRerankBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RerankResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            apply_sigmoid: false,
        }
    }

    pub fn apply_sigmoid(mut self, enabled: bool) -> Self {
        self.apply_sigmoid = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn normalize(&self, raw: f32) -> f32 {
        if !raw.is_finite() {
            return 0.0;
        }
        let score = if self.apply_sigmoid {
            1.0 / (1.0 + (-raw).exp())
        } else {
            raw
        };
        score.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl RerankBackend for HttpRerankBackend {
    fn name(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, query, passages), fields(url = %self.base_url, n = passages.len()))]
    async fn score(&self, query: &str, passages: &[&str]) -> RerankResult<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest {
                query,
                texts: passages,
                raw_scores: self.apply_sigmoid,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RerankError::Backend {
                reason: format!("status {status}: {body}"),
            });
        }

        let ranked: Vec<RankedText> = response.json().await?;
        if ranked.len() != passages.len() {
            return Err(RerankError::ScoreCount {
                expected: passages.len(),
                actual: ranked.len(),
            });
        }

        let mut scores = vec![f32::NAN; passages.len()];
        for r in ranked {
            let Some(slot) = scores.get_mut(r.index) else {
                return Err(RerankError::Backend {
                    reason: format!("score index {} out of range", r.index),
                });
            };
            *slot = self.normalize(r.score);
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Err(RerankError::Backend {
                reason: "duplicate score index in response".to_string(),
            });
        }
        debug!(scored = scores.len(), "http rerank complete");
        Ok(scores)
    }
}

impl std::fmt::Debug for HttpRerankBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRerankBackend")
            .field("base_url", &self.base_url)
            .field("apply_sigmoid", &self.apply_sigmoid)
            .finish()
    }
}
