//! Sluice library crate (used by the server and integration tests).
//!
//! Answers natural-language queries from a local knowledge base, falling back to web
//! search when retrieval confidence is low, while spreading embedding and generation
//! calls across several model-serving instances.
//!
//! # Public API Surface
//!
//! ## Core
//! - [`AnswerEngine`], [`AnswerOptions`], [`Answer`] - The answer pipeline
//! - [`Config`], [`ConfigError`] - Server configuration
//!
//! ## Inference routing
//! - [`InstanceRegistry`], [`HealthMonitor`] - Instance health and scoring
//! - [`Dispatcher`] - Load-balanced dispatch with failover and interceptors
//! - [`ModelBackend`], [`HttpModelBackend`] - Per-instance client contract
//!
//! ## Retrieval and gating
//! - [`HybridRetriever`] - Vector + lexical fusion
//! - [`Reranker`] - Cross-scoring with fallback to fused order
//! - [`ConfidenceScorer`], [`RoutingEngine`] - Answerability gate
//! - [`AnswerAssembler`] - Context building and generation
//!
//! ## Collaborators
//! - [`KnowledgeStore`], [`InMemoryKnowledgeStore`]
//! - [`WebSearch`], [`HttpWebSearch`], [`DisabledWebSearch`]
//! - [`ResponseCache`] - Embedding memo and semantic answer cache
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod answer;
pub mod backend;
pub mod cache;
pub mod confidence;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod hashing;
pub mod knowledge;
pub mod registry;
pub mod rerank;
pub mod retrieval;
pub mod routing;
pub mod text;
pub mod vector;
pub mod web;

#[cfg(any(test, feature = "mock"))]
pub mod testing;

pub use answer::{AnswerAssembler, AnswerConfig, AnswerError, Citation, CitationKind};
pub use backend::{
    BackendError, CallContext, GenerateParams, HttpModelBackend, InstanceKind, ModelBackend,
    Operation, TokenStream,
};
#[cfg(any(test, feature = "mock"))]
pub use backend::{MockModelBackend, bag_of_words_embedding};
pub use cache::{CacheConfig, CacheError, CacheStatus, ResponseCache};
pub use confidence::{ConfidenceConfig, ConfidenceScore, ConfidenceScorer};
pub use config::{Config, ConfigError};
pub use dispatch::{DispatchConfig, DispatchError, DispatchInterceptor, Dispatcher};
pub use engine::{
    Answer, AnswerEngine, AnswerMethod, AnswerOptions, AnswerStream, Degradation,
    DegradationKind, EngineConfig, EngineError, PipelineStage,
};
pub use gateway::{HandlerState, SLUICE_STATUS_HEADER, create_router_with_state};
pub use hashing::{hash_parts, hash_query, hash_to_u64};
pub use knowledge::{InMemoryKnowledgeStore, KnowledgeError, KnowledgeStore, Passage, StoreHit};
pub use registry::{
    HealthMonitor, Instance, InstanceRegistry, InstanceSpec, RegistryConfig, RegistryHealth,
};
pub use rerank::{LexicalCrossScorer, RerankBackend, RerankConfig, RerankStatus, Reranker};
pub use retrieval::{CandidatePassage, FusionMode, HybridRetriever, RetrievalConfig};
pub use routing::{Route, RouteDecision, RouteReason, RoutingEngine, RoutingThresholds};
#[cfg(any(test, feature = "mock"))]
pub use testing::MockCluster;
#[cfg(any(test, feature = "mock"))]
pub use web::MockWebSearch;
pub use web::{DisabledWebSearch, HttpWebSearch, WebResult, WebSearch};
