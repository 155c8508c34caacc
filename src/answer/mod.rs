//! Prompt and citation assembly over the routed sources, then generation.

pub mod assembler;
pub mod config;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use assembler::{AnswerAssembler, insufficient_knowledge_reply};
pub use config::AnswerConfig;
pub use error::{AnswerError, AnswerResult};
pub use types::{AssembledAnswer, AssembledContext, AssembledStream, Citation, CitationKind};
