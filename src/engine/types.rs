use futures_util::stream;
use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use crate::answer::Citation;
use crate::backend::{BackendError, GenerateParams, TokenStream};
use crate::cache::CacheStatus;
use crate::confidence::ConfidenceScore;
use crate::hashing::hash_parts;
use crate::rerank::RerankStatus;
use crate::retrieval::FusionMode;
use crate::routing::RouteDecision;

/// Per-request knobs. Requests with different options never share cache entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerOptions {
    pub use_web_fallback: bool,
    /// Overrides the `high` routing threshold for this request.
    pub confidence_threshold: Option<f32>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            use_web_fallback: true,
            confidence_threshold: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl AnswerOptions {
    pub fn use_web_fallback(mut self, enabled: bool) -> Self {
        self.use_web_fallback = enabled;
        self
    }

    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if let Some(t) = self.confidence_threshold
            && !(t.is_finite() && (0.0..=1.0).contains(&t))
        {
            return Err(EngineError::InvalidOptions {
                reason: format!("confidence_threshold must be within [0, 1], got {t}"),
            });
        }
        if let Some(t) = self.temperature
            && !(t.is_finite() && t >= 0.0)
        {
            return Err(EngineError::InvalidOptions {
                reason: format!("temperature must be a non-negative number, got {t}"),
            });
        }
        if self.max_tokens == Some(0) {
            return Err(EngineError::InvalidOptions {
                reason: "max_tokens must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Cache partition key. Float options are compared bit for bit.
    pub fn variant(&self) -> u64 {
        let bits = |v: Option<f32>| v.map_or_else(|| "-".to_string(), |f| format!("{:08x}", f.to_bits()));
        let web = if self.use_web_fallback { "web" } else { "noweb" };
        let threshold = bits(self.confidence_threshold);
        let temperature = bits(self.temperature);
        let max_tokens = self
            .max_tokens
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        hash_parts(&[web, &threshold, &temperature, &max_tokens])
    }

    pub fn generate_params(&self, defaults: GenerateParams) -> GenerateParams {
        GenerateParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// Pipeline stage a degradation was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Input,
    Embed,
    CacheLookup,
    Retrieval,
    Rerank,
    Confidence,
    Routing,
    WebSearch,
    Generation,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Input => "input",
            PipelineStage::Embed => "embed",
            PipelineStage::CacheLookup => "cache_lookup",
            PipelineStage::Retrieval => "retrieval",
            PipelineStage::Rerank => "rerank",
            PipelineStage::Confidence => "confidence",
            PipelineStage::Routing => "routing",
            PipelineStage::WebSearch => "web_search",
            PipelineStage::Generation => "generation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    InvalidOptions,
    /// Query embedding failed; retrieval ran lexical-only and the cache was skipped.
    EmbeddingUnavailable,
    /// One or both search sides failed.
    RetrievalFailed,
    /// Candidates kept fused order.
    RerankUnavailable,
    /// Route downgraded to knowledge-base only.
    WebSearchUnavailable,
    AllInstancesExhausted,
    GenerationFailed,
    DeadlineExceeded,
}

impl DegradationKind {
    /// Fatal kinds mean no generated answer was produced.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DegradationKind::AllInstancesExhausted
                | DegradationKind::GenerationFailed
                | DegradationKind::DeadlineExceeded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub kind: DegradationKind,
    pub stage: PipelineStage,
    pub detail: String,
}

impl Degradation {
    pub fn new(kind: DegradationKind, stage: PipelineStage, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            detail: detail.into(),
        }
    }
}

/// How the answer text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMethod {
    Generated,
    Cached,
    /// No source reached the context; a fixed reply was returned without generation.
    InsufficientKnowledge,
    /// Blank query.
    Acknowledgment,
    Degraded,
}

impl AnswerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerMethod::Generated => "generated",
            AnswerMethod::Cached => "cached",
            AnswerMethod::InsufficientKnowledge => "insufficient_knowledge",
            AnswerMethod::Acknowledgment => "acknowledgment",
            AnswerMethod::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheProvenance {
    pub status: CacheStatus,
    pub similarity: Option<f32>,
    /// Normalized query of the entry that served this answer.
    pub matched_query: Option<String>,
    pub hit_count: Option<u64>,
    /// The query embedding came from the exact-match memo.
    pub embedding_memo_hit: bool,
}

impl CacheProvenance {
    pub fn new(status: CacheStatus) -> Self {
        Self {
            status,
            similarity: None,
            matched_query: None,
            hit_count: None,
            embedding_memo_hit: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: String,
    pub query: String,
    pub method: AnswerMethod,
    pub answer: String,
    pub route: RouteDecision,
    pub confidence: ConfidenceScore,
    pub low_confidence: bool,
    pub citations: Vec<Citation>,
    pub cache: CacheProvenance,
    pub retrieval_mode: FusionMode,
    pub rerank: RerankStatus,
    /// Non-fatal problems the pipeline worked around.
    pub degradations: Vec<Degradation>,
    /// Set when no generated answer could be produced.
    pub error: Option<Degradation>,
    /// Generation was served by the primary fallback while no instance was healthy.
    pub registry_degraded: bool,
    pub instance_id: Option<String>,
    pub latency_ms: u64,
}

impl Answer {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Value of the `X-Sluice-Status` header.
    pub fn status_header(&self) -> String {
        status_header(self.cache.status, &self.route, self.error.as_ref())
    }
}

pub(crate) fn status_header(
    cache: CacheStatus,
    route: &RouteDecision,
    error: Option<&Degradation>,
) -> String {
    let mut value = format!("{}; route={}", cache.as_header_value(), route.route.as_str());
    if error.is_some() {
        value.push_str("; degraded");
    }
    value
}

/// Streaming counterpart of [`Answer`]. Everything but the text is known up front.
pub struct AnswerStream {
    pub request_id: String,
    pub query: String,
    pub method: AnswerMethod,
    pub route: RouteDecision,
    pub confidence: ConfidenceScore,
    pub low_confidence: bool,
    pub citations: Vec<Citation>,
    pub cache: CacheProvenance,
    pub retrieval_mode: FusionMode,
    pub rerank: RerankStatus,
    pub degradations: Vec<Degradation>,
    pub error: Option<Degradation>,
    pub registry_degraded: bool,
    pub instance_id: Option<String>,
    /// Ends early, without an error item, when the request deadline passes.
    pub tokens: TokenStream,
}

impl AnswerStream {
    /// Wraps a complete answer as a single-chunk stream.
    pub fn from_answer(answer: Answer) -> Self {
        let text = answer.answer;
        Self {
            request_id: answer.request_id,
            query: answer.query,
            method: answer.method,
            route: answer.route,
            confidence: answer.confidence,
            low_confidence: answer.low_confidence,
            citations: answer.citations,
            cache: answer.cache,
            retrieval_mode: answer.retrieval_mode,
            rerank: answer.rerank,
            degradations: answer.degradations,
            error: answer.error,
            registry_degraded: answer.registry_degraded,
            instance_id: answer.instance_id,
            tokens: Box::pin(stream::once(async move { Ok::<_, BackendError>(text) })),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn status_header(&self) -> String {
        status_header(self.cache.status, &self.route, self.error.as_ref())
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("route", &self.route.route)
            .field("citations", &self.citations.len())
            .field("error", &self.error)
            .finish()
    }
}
