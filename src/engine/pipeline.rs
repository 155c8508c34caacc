use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::time;
use tracing::{Span, debug, field, info, instrument, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::EngineResult;
use super::types::{
    Answer, AnswerMethod, AnswerOptions, AnswerStream, CacheProvenance, Degradation,
    DegradationKind, PipelineStage,
};
use crate::answer::{AnswerAssembler, AnswerConfig, AnswerError, AssembledContext, Citation};
use crate::backend::{GenerateParams, TokenStream};
use crate::cache::{CacheConfig, CacheHit, CacheStatus, ResponseCache};
use crate::confidence::{ConfidenceConfig, ConfidenceScore, ConfidenceScorer};
use crate::dispatch::Dispatcher;
use crate::knowledge::KnowledgeStore;
use crate::registry::InstanceRegistry;
use crate::rerank::{LexicalCrossScorer, RerankBackend, RerankConfig, RerankStatus, Reranker};
use crate::retrieval::{FusionMode, HybridRetriever, RetrievalConfig};
use crate::routing::{RouteDecision, RoutingEngine, RoutingThresholds};
use crate::text::normalize_query;
use crate::web::{DisabledWebSearch, WebResult, WebSearch, WebSearchError, WebSearchResult};

pub const EMPTY_QUERY_REPLY: &str = "Please provide a question to answer.";

const EXHAUSTED_REPLY: &str =
    "No model instance is available to generate an answer right now. Please retry shortly.";

const GENERATION_FAILED_REPLY: &str = "The answer could not be generated.";

fn deadline_reply(deadline: Duration) -> String {
    format!(
        "The request did not complete within its {}ms deadline.",
        deadline.as_millis()
    )
}

/// Runs the full query pipeline: embed, cache lookup, retrieval, rerank, confidence,
/// routing, optional web search, generation, cache insert.
pub struct AnswerEngine {
    dispatcher: Arc<Dispatcher>,
    cache: Arc<ResponseCache<Answer>>,
    retriever: HybridRetriever,
    reranker: Reranker,
    scorer: ConfidenceScorer,
    router: RoutingEngine,
    web: Arc<dyn WebSearch>,
    assembler: AnswerAssembler,
    generate_defaults: GenerateParams,
    config: EngineConfig,
}

pub struct AnswerEngineBuilder {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn KnowledgeStore>,
    cache: Option<Arc<ResponseCache<Answer>>>,
    cache_config: CacheConfig,
    retrieval: RetrievalConfig,
    rerank_backend: Arc<dyn RerankBackend>,
    rerank: RerankConfig,
    confidence: ConfidenceConfig,
    thresholds: RoutingThresholds,
    web: Arc<dyn WebSearch>,
    answer: AnswerConfig,
    generate_defaults: GenerateParams,
    config: EngineConfig,
}

impl AnswerEngineBuilder {
    /// Shares an existing cache instead of building one from `cache_config`.
    pub fn cache(mut self, cache: Arc<ResponseCache<Answer>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn retrieval(mut self, config: RetrievalConfig) -> Self {
        self.retrieval = config;
        self
    }

    pub fn rerank_backend(mut self, backend: Arc<dyn RerankBackend>) -> Self {
        self.rerank_backend = backend;
        self
    }

    pub fn rerank(mut self, config: RerankConfig) -> Self {
        self.rerank = config;
        self
    }

    pub fn confidence(mut self, config: ConfidenceConfig) -> Self {
        self.confidence = config;
        self
    }

    pub fn thresholds(mut self, thresholds: RoutingThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn web(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = web;
        self
    }

    pub fn answer(mut self, config: AnswerConfig) -> Self {
        self.answer = config;
        self
    }

    pub fn generate_defaults(mut self, params: GenerateParams) -> Self {
        self.generate_defaults = params;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EngineResult<AnswerEngine> {
        self.config.validate()?;
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(ResponseCache::new(self.cache_config)?),
        };
        Ok(AnswerEngine {
            retriever: HybridRetriever::new(self.store, self.retrieval)?,
            reranker: Reranker::new(self.rerank_backend, self.rerank)?,
            scorer: ConfidenceScorer::new(self.confidence)?,
            router: RoutingEngine::new(self.thresholds)?,
            assembler: AnswerAssembler::new(Arc::clone(&self.dispatcher), self.answer)?,
            dispatcher: self.dispatcher,
            cache,
            web: self.web,
            generate_defaults: self.generate_defaults,
            config: self.config,
        })
    }
}

/// State accumulated while a request runs, kept outside the pipeline future so a
/// deadline can still report what was computed.
#[derive(Debug, Clone)]
struct Progress {
    request_id: String,
    query: String,
    stage: PipelineStage,
    decision: RouteDecision,
    confidence: ConfidenceScore,
    citations: Vec<Citation>,
    retrieval_mode: FusionMode,
    rerank: RerankStatus,
    cache: CacheProvenance,
    degradations: Vec<Degradation>,
    registry_degraded: bool,
}

impl Progress {
    fn degrade(&mut self, kind: DegradationKind, detail: impl Into<String>) {
        let degradation = Degradation::new(kind, self.stage, detail);
        warn!(
            kind = ?degradation.kind,
            stage = self.stage.as_str(),
            detail = %degradation.detail,
            "pipeline degraded"
        );
        self.degradations.push(degradation);
    }

    fn finish(
        self,
        method: AnswerMethod,
        text: String,
        instance_id: Option<String>,
        error: Option<Degradation>,
    ) -> Answer {
        Answer {
            request_id: self.request_id,
            query: self.query,
            method,
            answer: text,
            low_confidence: self.decision.low_confidence,
            route: self.decision,
            confidence: self.confidence,
            citations: self.citations,
            cache: self.cache,
            retrieval_mode: self.retrieval_mode,
            rerank: self.rerank,
            degradations: self.degradations,
            error,
            registry_degraded: self.registry_degraded,
            instance_id,
            latency_ms: 0,
        }
    }

    fn cached(self, hit: CacheHit<Answer>) -> Answer {
        let mut answer = hit.payload;
        answer.request_id = self.request_id;
        answer.query = self.query;
        answer.method = AnswerMethod::Cached;
        answer.cache = CacheProvenance {
            status: CacheStatus::HitSemantic,
            similarity: Some(hit.similarity),
            matched_query: Some(hit.matched_query),
            hit_count: Some(hit.hit_count),
            embedding_memo_hit: self.cache.embedding_memo_hit,
        };
        answer.degradations = self.degradations;
        answer.registry_degraded = self.registry_degraded;
        answer
    }

    fn into_stream(
        self,
        method: AnswerMethod,
        tokens: TokenStream,
        instance_id: Option<String>,
    ) -> AnswerStream {
        AnswerStream {
            request_id: self.request_id,
            query: self.query,
            method,
            low_confidence: self.decision.low_confidence,
            route: self.decision,
            confidence: self.confidence,
            citations: self.citations,
            cache: self.cache,
            retrieval_mode: self.retrieval_mode,
            rerank: self.rerank,
            degradations: self.degradations,
            error: None,
            registry_degraded: self.registry_degraded,
            instance_id,
            tokens,
        }
    }
}

/// A request that reached generation.
struct Ready {
    normalized: String,
    embedding: Option<Arc<Vec<f32>>>,
    context: AssembledContext,
    low_confidence: bool,
    params: GenerateParams,
}

enum Prepared {
    /// Answered without generation (blank query or cache hit).
    Done(Answer),
    Ready(Ready),
}

impl AnswerEngine {
    /// Defaults: lexical cross scorer for reranking, web search disabled.
    pub fn builder(dispatcher: Arc<Dispatcher>, store: Arc<dyn KnowledgeStore>) -> AnswerEngineBuilder {
        AnswerEngineBuilder {
            dispatcher,
            store,
            cache: None,
            cache_config: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            rerank_backend: Arc::new(LexicalCrossScorer::new()),
            rerank: RerankConfig::default(),
            confidence: ConfidenceConfig::default(),
            thresholds: RoutingThresholds::default(),
            web: Arc::new(DisabledWebSearch),
            answer: AnswerConfig::default(),
            generate_defaults: GenerateParams::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResponseCache<Answer>> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        self.dispatcher.registry()
    }

    pub fn web(&self) -> &Arc<dyn WebSearch> {
        &self.web
    }

    pub fn thresholds(&self) -> RoutingThresholds {
        self.router.thresholds()
    }

    /// Answers `query`. Never fails: errors and deadline expiry produce a degraded
    /// [`Answer`] carrying the route and confidence computed so far.
    #[instrument(skip_all, fields(request_id = field::Empty))]
    pub async fn answer(&self, query: &str, options: &AnswerOptions) -> Answer {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());

        let progress = Mutex::new(self.start(&request_id, query, options, CacheStatus::Miss));
        let outcome = time::timeout(
            self.config.deadline,
            self.run(&request_id, query, options, &progress),
        )
        .await;
        let mut answer = match outcome {
            Ok(answer) => answer,
            Err(_) => self.deadline_exceeded(progress.into_inner()),
        };
        answer.latency_ms = started.elapsed().as_millis() as u64;

        info!(
            method = answer.method.as_str(),
            route = answer.route.route.as_str(),
            confidence = answer.confidence.value,
            cache = answer.cache.status.as_header_value(),
            citations = answer.citations.len(),
            latency_ms = answer.latency_ms,
            "answer complete"
        );
        answer
    }

    /// Like [`Self::answer`], but generation is streamed. Never consults or fills the
    /// semantic answer cache. Token delivery stops at the request deadline.
    #[instrument(skip_all, fields(request_id = field::Empty))]
    pub async fn answer_stream(&self, query: &str, options: &AnswerOptions) -> AnswerStream {
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());
        let deadline = time::Instant::now() + self.config.deadline;

        let progress = Mutex::new(self.start(&request_id, query, options, CacheStatus::Bypass));
        let outcome = time::timeout_at(
            deadline,
            self.open_stream(&request_id, query, options, &progress, deadline),
        )
        .await;
        match outcome {
            Ok(stream) => stream,
            Err(_) => AnswerStream::from_answer(self.deadline_exceeded(progress.into_inner())),
        }
    }

    fn start(
        &self,
        request_id: &str,
        query: &str,
        options: &AnswerOptions,
        status: CacheStatus,
    ) -> Progress {
        let base = self.router.thresholds();
        let web_available = options.use_web_fallback && self.web.is_available();

        let (thresholds, rejected) = match options.confidence_threshold {
            None => (base, None),
            Some(high) => match base.with_high(high) {
                Ok(t) => (t, None),
                Err(e) => (base, Some(e.to_string())),
            },
        };

        let mut progress = Progress {
            request_id: request_id.to_string(),
            query: query.to_string(),
            stage: PipelineStage::Input,
            decision: RoutingEngine::decide_with(thresholds, 0.0, 0, web_available),
            confidence: ConfidenceScore::zero(),
            citations: Vec::new(),
            retrieval_mode: FusionMode::Empty,
            rerank: RerankStatus::Skipped,
            cache: CacheProvenance::new(status),
            degradations: Vec::new(),
            registry_degraded: false,
        };
        if let Some(reason) = rejected {
            progress.degrade(DegradationKind::InvalidOptions, reason);
        }
        progress
    }

    async fn run(
        &self,
        request_id: &str,
        query: &str,
        options: &AnswerOptions,
        progress: &Mutex<Progress>,
    ) -> Answer {
        let ready = match self.prepare(request_id, query, options, progress, true).await {
            Prepared::Done(answer) => return answer,
            Prepared::Ready(ready) => ready,
        };

        progress.lock().stage = PipelineStage::Generation;
        let result = self
            .assembler
            .generate(request_id, query, ready.context, ready.low_confidence, &ready.params)
            .await;

        let mut p = progress.lock().clone();
        match result {
            Ok(assembled) => {
                p.registry_degraded |= assembled.via_fallback;
                p.citations = assembled.citations;
                let method = if assembled.insufficient_knowledge {
                    AnswerMethod::InsufficientKnowledge
                } else {
                    AnswerMethod::Generated
                };
                let answer = p.finish(method, assembled.text, assembled.instance_id, None);
                if method == AnswerMethod::Generated {
                    self.store(
                        ready.embedding.as_deref(),
                        ready.normalized,
                        options.variant(),
                        &answer,
                    );
                }
                answer
            }
            Err(err) => Self::generation_failed(p, err),
        }
    }

    async fn open_stream(
        &self,
        request_id: &str,
        query: &str,
        options: &AnswerOptions,
        progress: &Mutex<Progress>,
        deadline: time::Instant,
    ) -> AnswerStream {
        let ready = match self.prepare(request_id, query, options, progress, false).await {
            Prepared::Done(answer) => return AnswerStream::from_answer(answer),
            Prepared::Ready(ready) => ready,
        };

        progress.lock().stage = PipelineStage::Generation;
        let result = self
            .assembler
            .generate_stream(request_id, query, ready.context, ready.low_confidence, &ready.params)
            .await;

        let mut p = progress.lock().clone();
        match result {
            Ok(assembled) => {
                p.registry_degraded |= assembled.via_fallback;
                p.citations = assembled.citations;
                let method = if assembled.insufficient_knowledge {
                    AnswerMethod::InsufficientKnowledge
                } else {
                    AnswerMethod::Generated
                };
                let tokens: TokenStream =
                    Box::pin(assembled.tokens.take_until(time::sleep_until(deadline)));
                p.into_stream(method, tokens, assembled.instance_id)
            }
            Err(err) => AnswerStream::from_answer(Self::generation_failed(p, err)),
        }
    }

    /// Every stage up to (not including) generation.
    async fn prepare(
        &self,
        request_id: &str,
        query: &str,
        options: &AnswerOptions,
        progress: &Mutex<Progress>,
        use_cache: bool,
    ) -> Prepared {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            debug!("blank query, acknowledging");
            let p = progress.lock().clone();
            return Prepared::Done(p.finish(
                AnswerMethod::Acknowledgment,
                EMPTY_QUERY_REPLY.to_string(),
                None,
                None,
            ));
        }

        progress.lock().stage = PipelineStage::Embed;
        let embedding = self.embed(request_id, &normalized, progress).await;

        if use_cache
            && self.config.cache_answers
            && let Some(embedding) = &embedding
        {
            progress.lock().stage = PipelineStage::CacheLookup;
            if let Some(hit) = self.cache.semantic().lookup(embedding, options.variant()) {
                let p = progress.lock().clone();
                return Prepared::Done(p.cached(hit));
            }
        }

        progress.lock().stage = PipelineStage::Retrieval;
        let query_embedding = embedding.as_deref().map(Vec::as_slice);
        let candidates = match self.retriever.retrieve(query, query_embedding).await {
            Ok(outcome) => {
                let mut p = progress.lock();
                p.retrieval_mode = outcome.mode;
                if query_embedding.is_some()
                    && let Some(e) = &outcome.vector_error
                {
                    p.degrade(DegradationKind::RetrievalFailed, format!("vector search: {e}"));
                }
                if let Some(e) = &outcome.lexical_error {
                    p.degrade(DegradationKind::RetrievalFailed, format!("lexical search: {e}"));
                }
                outcome.candidates
            }
            Err(e) => {
                progress.lock().degrade(DegradationKind::RetrievalFailed, e.to_string());
                Vec::new()
            }
        };

        progress.lock().stage = PipelineStage::Rerank;
        let reranked = self.reranker.rerank(query, candidates).await;
        {
            let mut p = progress.lock();
            if let RerankStatus::FellBack { reason } = &reranked.status {
                p.degrade(DegradationKind::RerankUnavailable, reason.clone());
            }
            p.rerank = reranked.status.clone();
        }
        let candidates = reranked.candidates;

        let decision = {
            let mut p = progress.lock();
            p.stage = PipelineStage::Confidence;
            let confidence = self.scorer.score(query, &candidates);
            p.confidence = confidence;
            p.stage = PipelineStage::Routing;
            let decision = RoutingEngine::decide_with(
                p.decision.thresholds,
                confidence.value,
                candidates.len(),
                p.decision.web_available,
            );
            p.decision = decision.clone();
            decision
        };

        let mut web_results: Vec<WebResult> = Vec::new();
        let decision = if decision.route.uses_web() {
            progress.lock().stage = PipelineStage::WebSearch;
            match self.search_web(query).await {
                Ok(results) => {
                    debug!(results = results.len(), "web search complete");
                    web_results = results;
                    decision
                }
                Err(e) => {
                    let downgraded = RoutingEngine::downgrade(&decision);
                    let mut p = progress.lock();
                    p.degrade(DegradationKind::WebSearchUnavailable, e.to_string());
                    p.decision = downgraded.clone();
                    downgraded
                }
            }
        } else {
            decision
        };

        let context = self
            .assembler
            .build_context(decision.route, &candidates, &web_results);
        progress.lock().citations = context.citations.clone();

        Prepared::Ready(Ready {
            normalized,
            embedding,
            context,
            low_confidence: decision.low_confidence,
            params: options.generate_params(self.generate_defaults),
        })
    }

    /// Memo first, then the dispatcher. A failed embedding is recorded and yields `None`.
    async fn embed(
        &self,
        request_id: &str,
        normalized: &str,
        progress: &Mutex<Progress>,
    ) -> Option<Arc<Vec<f32>>> {
        if let Some(embedding) = self.cache.memo().get(normalized) {
            progress.lock().cache.embedding_memo_hit = true;
            return Some(embedding);
        }
        match self.dispatcher.embed(request_id, normalized).await {
            Ok(result) => {
                if result.via_fallback {
                    progress.lock().registry_degraded = true;
                }
                Some(self.cache.memo().insert(normalized, result.output))
            }
            Err(e) => {
                progress
                    .lock()
                    .degrade(DegradationKind::EmbeddingUnavailable, e.to_string());
                None
            }
        }
    }

    async fn search_web(&self, query: &str) -> WebSearchResult<Vec<WebResult>> {
        let timeout = self.config.web_timeout;
        match time::timeout(timeout, self.web.search(query, self.config.web_max_results)).await {
            Ok(result) => result,
            Err(_) => Err(WebSearchError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Only clean answers are cached.
    fn store(&self, embedding: Option<&Vec<f32>>, normalized: String, variant: u64, answer: &Answer) {
        if !self.config.cache_answers || !answer.degradations.is_empty() {
            return;
        }
        let Some(embedding) = embedding else {
            return;
        };
        match self
            .cache
            .semantic()
            .insert(embedding.clone(), normalized, variant, answer.clone())
        {
            Ok(id) => debug!(entry = id, "answer cached"),
            Err(e) => warn!(error = %e, "answer not cached"),
        }
    }

    fn generation_failed(progress: Progress, err: AnswerError) -> Answer {
        let (kind, reply) = match &err {
            AnswerError::Dispatch(e) if e.is_exhaustion() => {
                (DegradationKind::AllInstancesExhausted, EXHAUSTED_REPLY)
            }
            _ => (DegradationKind::GenerationFailed, GENERATION_FAILED_REPLY),
        };
        warn!(error = %err, ?kind, "generation failed, returning degraded answer");
        let error = Degradation::new(kind, PipelineStage::Generation, err.to_string());
        progress.finish(AnswerMethod::Degraded, reply.to_string(), None, Some(error))
    }

    fn deadline_exceeded(&self, progress: Progress) -> Answer {
        let deadline = self.config.deadline;
        warn!(
            stage = progress.stage.as_str(),
            deadline_ms = deadline.as_millis() as u64,
            "request deadline exceeded"
        );
        let error = Degradation::new(
            DegradationKind::DeadlineExceeded,
            progress.stage,
            format!(
                "deadline of {}ms exceeded during {}",
                deadline.as_millis(),
                progress.stage.as_str()
            ),
        );
        progress.finish(AnswerMethod::Degraded, deadline_reply(deadline), None, Some(error))
    }
}

impl std::fmt::Debug for AnswerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("config", &self.config)
            .field("thresholds", &self.router.thresholds())
            .field("web", &self.web.name())
            .field("rerank", &self.reranker.backend_name())
            .finish()
    }
}
