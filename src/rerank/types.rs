use serde::Serialize;

use crate::retrieval::CandidatePassage;

/// What happened to the ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RerankStatus {
    Reranked { backend: String, scored: usize },
    /// Nothing to rerank.
    Skipped,
    /// The backend failed; candidates keep fused order.
    FellBack { reason: String },
}

impl RerankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankStatus::Reranked { .. } => "reranked",
            RerankStatus::Skipped => "skipped",
            RerankStatus::FellBack { .. } => "fell_back",
        }
    }

    pub fn fell_back(&self) -> bool {
        matches!(self, RerankStatus::FellBack { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    pub candidates: Vec<CandidatePassage>,
    pub status: RerankStatus,
}
