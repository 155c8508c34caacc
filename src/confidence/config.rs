use super::error::{ConfidenceError, ConfidenceResult};

/// Phrases that signal the source itself is unsure.
pub const DEFAULT_HEDGE_PHRASES: &[&str] = &[
    "may",
    "might",
    "possibly",
    "perhaps",
    "probably",
    "likely",
    "unclear",
    "uncertain",
    "unknown",
    "not specified",
    "not documented",
    "not sure",
    "it depends",
    "could be",
    "approximately",
];

/// Weights of the single confidence formula. Alternate heuristics are expressed by
/// changing these, never by adding code paths.
#[derive(Debug, Clone)]
pub struct ConfidenceConfig {
    pub relevance_weight: f32,
    pub overlap_weight: f32,
    pub hedge_weight: f32,
    /// Hedge hits at which the penalty saturates at 1.
    pub hedge_saturation: u32,
    /// How many top candidates feed overlap and hedging.
    pub overlap_window: usize,
    pub hedge_phrases: Vec<String>,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 0.45,
            overlap_weight: 0.55,
            hedge_weight: 0.6,
            hedge_saturation: 3,
            overlap_window: 3,
            hedge_phrases: DEFAULT_HEDGE_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ConfidenceConfig {
    pub fn weights(mut self, relevance: f32, overlap: f32, hedge: f32) -> Self {
        self.relevance_weight = relevance;
        self.overlap_weight = overlap;
        self.hedge_weight = hedge;
        self
    }

    pub fn hedge_saturation(mut self, hits: u32) -> Self {
        self.hedge_saturation = hits;
        self
    }

    pub fn overlap_window(mut self, window: usize) -> Self {
        self.overlap_window = window;
        self
    }

    pub fn hedge_phrases(mut self, phrases: Vec<String>) -> Self {
        self.hedge_phrases = phrases;
        self
    }

    pub fn validate(&self) -> ConfidenceResult<()> {
        let weights = [self.relevance_weight, self.overlap_weight, self.hedge_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfidenceError::InvalidConfig {
                reason: format!("weights must be finite and non-negative, got {weights:?}"),
            });
        }
        if self.hedge_saturation == 0 {
            return Err(ConfidenceError::InvalidConfig {
                reason: "hedge_saturation must be at least 1".to_string(),
            });
        }
        if self.overlap_window == 0 {
            return Err(ConfidenceError::InvalidConfig {
                reason: "overlap_window must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
