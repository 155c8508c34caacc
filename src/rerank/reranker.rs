use std::cmp::Ordering;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::RerankBackend;
use super::config::RerankConfig;
use super::error::{RerankError, RerankResult};
use super::types::{RerankOutcome, RerankStatus};
use crate::retrieval::CandidatePassage;

/// Rescores the head of the fused list. Never fails: backend trouble leaves fused order.
pub struct Reranker {
    backend: Arc<dyn RerankBackend>,
    config: RerankConfig,
}

impl Reranker {
    pub fn new(backend: Arc<dyn RerankBackend>, config: RerankConfig) -> RerankResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Reorders the first `top_k` candidates by rerank score. Equal scores keep fused
    /// order; the tail is untouched.
    #[instrument(skip(self, query, candidates), fields(n = candidates.len(), backend = self.backend.name()))]
    pub async fn rerank(&self, query: &str, mut candidates: Vec<CandidatePassage>) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome {
                candidates,
                status: RerankStatus::Skipped,
            };
        }

        let k = self.config.top_k.min(candidates.len());
        let scores = match self.score_head(query, &candidates[..k]).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "rerank unavailable, keeping fused order");
                return RerankOutcome {
                    candidates,
                    status: RerankStatus::FellBack {
                        reason: e.to_string(),
                    },
                };
            }
        };

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }
        // Stable sort: ties keep their fused position.
        candidates[..k].sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(Ordering::Equal)
        });

        debug!(
            scored = k,
            top = candidates.first().and_then(|c| c.rerank_score),
            "rerank complete"
        );
        RerankOutcome {
            candidates,
            status: RerankStatus::Reranked {
                backend: self.backend.name().to_string(),
                scored: k,
            },
        }
    }

    async fn score_head(&self, query: &str, head: &[CandidatePassage]) -> RerankResult<Vec<f32>> {
        let texts: Vec<&str> = head.iter().map(|c| c.content.as_str()).collect();
        let scores = timeout(self.config.timeout, self.backend.score(query, &texts))
            .await
            .map_err(|_| RerankError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            })??;
        if scores.len() != head.len() {
            return Err(RerankError::ScoreCount {
                expected: head.len(),
                actual: scores.len(),
            });
        }
        Ok(scores
            .into_iter()
            .map(|s| if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 })
            .collect())
    }
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}
