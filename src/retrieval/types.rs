use chrono::{DateTime, Utc};
use serde::Serialize;

/// A passage after fusion.
///
/// `fused_score` is fixed once fusion runs. Reranking only sets `rerank_score` and
/// reorders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePassage {
    pub id: String,
    pub content: String,
    pub source_document: String,
    pub updated_at: Option<DateTime<Utc>>,
    /// Normalized vector score, `None` when absent from the vector list.
    pub vector_score: Option<f32>,
    /// Max-normalized lexical score, `None` when absent from the lexical list.
    pub lexical_score: Option<f32>,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
}

impl CandidatePassage {
    /// Best available relevance: rerank score when present, else fused score.
    #[inline]
    pub fn relevance(&self) -> f32 {
        self.rerank_score.unwrap_or(self.fused_score)
    }
}

/// Which signals contributed to the fused list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    Hybrid,
    VectorOnly,
    LexicalOnly,
    Empty,
}

impl FusionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionMode::Hybrid => "hybrid",
            FusionMode::VectorOnly => "vector_only",
            FusionMode::LexicalOnly => "lexical_only",
            FusionMode::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub candidates: Vec<CandidatePassage>,
    pub mode: FusionMode,
    pub vector_hits: usize,
    pub lexical_hits: usize,
    /// Set when the vector side failed or timed out.
    pub vector_error: Option<String>,
    /// Set when the lexical side failed or timed out.
    pub lexical_error: Option<String>,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.vector_error.is_some() || self.lexical_error.is_some()
    }
}
