use async_trait::async_trait;
use tracing::debug;

use super::RerankBackend;
use super::error::RerankResult;
use crate::text::content_term_set;

/// Local joint query/passage scorer.
///
/// Blends recall of the query's content terms with Jaccard overlap, then squashes the
/// blend through a sigmoid centred on 0.5. Deterministic and allocation-light enough to
/// run on every request when no cross-encoder service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalCrossScorer;

impl LexicalCrossScorer {
    pub const RECALL_WEIGHT: f32 = 0.6;
    pub const JACCARD_WEIGHT: f32 = 0.4;
    pub const STEEPNESS: f32 = 8.0;

    pub fn new() -> Self {
        Self
    }

    pub fn score_pair(&self, query: &str, passage: &str) -> f32 {
        let query_terms = content_term_set(query);
        let passage_terms = content_term_set(passage);

        if query_terms.is_empty() {
            // No content terms to compare; fall back to a weak length-ratio signal.
            let ratio = (query.len().min(passage.len()) as f32)
                / (query.len().max(passage.len()).max(1) as f32);
            return ratio * 0.3;
        }

        let matches = query_terms.intersection(&passage_terms).count();
        let recall = matches as f32 / query_terms.len() as f32;
        let union = query_terms.union(&passage_terms).count();
        let jaccard = if union > 0 {
            matches as f32 / union as f32
        } else {
            0.0
        };

        let base = Self::RECALL_WEIGHT * recall + Self::JACCARD_WEIGHT * jaccard;
        let squashed = 1.0 / (1.0 + (-Self::STEEPNESS * (base - 0.5)).exp());
        squashed.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl RerankBackend for LexicalCrossScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, passages: &[&str]) -> RerankResult<Vec<f32>> {
        let scores: Vec<f32> = passages
            .iter()
            .map(|p| self.score_pair(query, p))
            .collect();
        debug!(
            scored = scores.len(),
            top = scores.iter().copied().fold(0.0f32, f32::max),
            "lexical rerank"
        );
        Ok(scores)
    }
}
