use std::collections::HashSet;

use tracing::{debug, instrument};

use super::config::ConfidenceConfig;
use super::error::ConfidenceResult;
use super::types::{ConfidenceComponents, ConfidenceScore};
use crate::retrieval::CandidatePassage;
use crate::text::{content_term_set, content_terms, tokenize};

/// Turns a ranked candidate list into one confidence value.
///
/// `value = clamp(w_rel * relevance + w_overlap * overlap - w_hedge * penalty, 0, 1)`.
/// Pure function of its inputs.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
    /// Hedge phrases pre-split into token sequences.
    phrases: Vec<Vec<String>>,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::build(ConfidenceConfig::default())
    }
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> ConfidenceResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ConfidenceConfig) -> Self {
        let phrases = config
            .hedge_phrases
            .iter()
            .map(|p| tokenize(p))
            .filter(|p| !p.is_empty())
            .collect();
        Self { config, phrases }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub fn score(&self, query: &str, candidates: &[CandidatePassage]) -> ConfidenceScore {
        let Some(top) = candidates.first() else {
            return ConfidenceScore::zero();
        };
        let window = &candidates[..self.config.overlap_window.min(candidates.len())];

        let context_relevance = unit(top.relevance());
        let overlap_score = self.overlap(query, window);
        let hedge_hits = self.hedge_hits(window);
        let hedging_penalty = (hedge_hits as f32 / self.config.hedge_saturation as f32).min(1.0);

        let raw = self.config.relevance_weight * context_relevance
            + self.config.overlap_weight * overlap_score
            - self.config.hedge_weight * hedging_penalty;
        let value = unit(raw);

        debug!(
            value,
            context_relevance, overlap_score, hedging_penalty, hedge_hits, "confidence scored"
        );

        ConfidenceScore {
            value,
            components: ConfidenceComponents {
                context_relevance,
                overlap_score,
                hedging_penalty,
                hedge_hits,
            },
        }
    }

    fn overlap(&self, query: &str, window: &[CandidatePassage]) -> f32 {
        let query_terms = content_terms(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let context: HashSet<String> = window
            .iter()
            .flat_map(|c| content_term_set(&c.content))
            .collect();
        let found = query_terms.iter().filter(|t| context.contains(*t)).count();
        found as f32 / query_terms.len() as f32
    }

    fn hedge_hits(&self, window: &[CandidatePassage]) -> u32 {
        window
            .iter()
            .map(|c| {
                let tokens = tokenize(&c.content);
                self.phrases
                    .iter()
                    .map(|phrase| count_phrase(&tokens, phrase))
                    .sum::<u32>()
            })
            .sum()
    }
}

fn count_phrase(tokens: &[String], phrase: &[String]) -> u32 {
    if phrase.len() > tokens.len() {
        return 0;
    }
    tokens
        .windows(phrase.len())
        .filter(|w| *w == phrase)
        .count() as u32
}

/// Clamps into `[0, 1]`; non-finite input counts as 0.
#[inline]
fn unit(x: f32) -> f32 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}
