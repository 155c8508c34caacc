use serde::Serialize;

use super::config::RoutingThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    RagOnly,
    RagWebBlend,
    WebOnly,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::RagOnly => "RAG_ONLY",
            Route::RagWebBlend => "RAG_WEB_BLEND",
            Route::WebOnly => "WEB_ONLY",
        }
    }

    pub fn uses_web(&self) -> bool {
        matches!(self, Route::RagWebBlend | Route::WebOnly)
    }

    pub fn uses_kb(&self) -> bool {
        matches!(self, Route::RagOnly | Route::RagWebBlend)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    ConfidentKnowledge,
    PartialKnowledge,
    LowConfidence,
    NoCandidates,
    /// Web was wanted but is disabled or not configured.
    WebUnavailable,
    /// Web was wanted and the search call failed.
    WebSearchFailed,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::ConfidentKnowledge => "confident_knowledge",
            RouteReason::PartialKnowledge => "partial_knowledge",
            RouteReason::LowConfidence => "low_confidence",
            RouteReason::NoCandidates => "no_candidates",
            RouteReason::WebUnavailable => "web_unavailable",
            RouteReason::WebSearchFailed => "web_search_failed",
        }
    }
}

/// Routing outcome for one request, with everything that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub route: Route,
    pub confidence: f32,
    pub thresholds: RoutingThresholds,
    pub reason: RouteReason,
    /// Set when the answer rests on weaker evidence than the gate asked for.
    pub low_confidence: bool,
    pub web_available: bool,
    pub candidate_count: usize,
}
