use tracing::{debug, info};

use super::config::RoutingThresholds;
use super::error::RoutingResult;
use super::types::{Route, RouteDecision, RouteReason};

/// Decides once per request where the answer comes from.
#[derive(Debug, Clone, Default)]
pub struct RoutingEngine {
    thresholds: RoutingThresholds,
}

impl RoutingEngine {
    pub fn new(thresholds: RoutingThresholds) -> RoutingResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> RoutingThresholds {
        self.thresholds
    }

    pub fn decide(&self, confidence: f32, candidate_count: usize, web_available: bool) -> RouteDecision {
        Self::decide_with(self.thresholds, confidence, candidate_count, web_available)
    }

    /// `high` ≤ confidence → RagOnly; `low` ≤ confidence < `high` → blend;
    /// below `low` or no candidates → WebOnly. Without web, web-seeking routes fall back
    /// to RagOnly flagged low-confidence.
    pub fn decide_with(
        thresholds: RoutingThresholds,
        confidence: f32,
        candidate_count: usize,
        web_available: bool,
    ) -> RouteDecision {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (route, reason) = if candidate_count == 0 {
            (Route::WebOnly, RouteReason::NoCandidates)
        } else if confidence >= thresholds.high {
            (Route::RagOnly, RouteReason::ConfidentKnowledge)
        } else if confidence >= thresholds.low {
            (Route::RagWebBlend, RouteReason::PartialKnowledge)
        } else {
            (Route::WebOnly, RouteReason::LowConfidence)
        };

        let decision = RouteDecision {
            route,
            confidence,
            thresholds,
            reason,
            low_confidence: false,
            web_available,
            candidate_count,
        };

        let decision = if route.uses_web() && !web_available {
            RouteDecision {
                route: Route::RagOnly,
                reason: RouteReason::WebUnavailable,
                low_confidence: true,
                ..decision
            }
        } else {
            decision
        };

        debug!(
            route = decision.route.as_str(),
            reason = decision.reason.as_str(),
            confidence,
            high = thresholds.high,
            low = thresholds.low,
            "route decided"
        );
        decision
    }

    /// Applied when a web search fails at runtime.
    pub fn downgrade(decision: &RouteDecision) -> RouteDecision {
        if !decision.route.uses_web() {
            return decision.clone();
        }
        info!(from = decision.route.as_str(), "web search failed, downgrading to RAG_ONLY");
        RouteDecision {
            route: Route::RagOnly,
            reason: RouteReason::WebSearchFailed,
            low_confidence: true,
            web_available: false,
            ..decision.clone()
        }
    }
}
