//! The answer pipeline: ties the registry-backed dispatcher, the response cache,
//! hybrid retrieval, reranking, confidence scoring, routing, web search and answer
//! assembly into the single `answer` operation.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;


pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use pipeline::{AnswerEngine, AnswerEngineBuilder, EMPTY_QUERY_REPLY};
pub use types::{
    Answer, AnswerMethod, AnswerOptions, AnswerStream, CacheProvenance, Degradation,
    DegradationKind, PipelineStage,
};
