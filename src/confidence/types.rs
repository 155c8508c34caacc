use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfidenceComponents {
    /// Top candidate's rerank score, or fused score when not reranked.
    pub context_relevance: f32,
    /// Share of query content terms found in the top candidates.
    pub overlap_score: f32,
    /// `min(1, hedge_hits / saturation)`.
    pub hedging_penalty: f32,
    pub hedge_hits: u32,
}

/// Always within `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfidenceScore {
    pub value: f32,
    pub components: ConfidenceComponents,
}

impl ConfidenceScore {
    pub fn zero() -> Self {
        Self::default()
    }
}
