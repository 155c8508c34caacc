//! Second-pass relevance scoring over the head of the fused candidate list.

pub mod config;
pub mod error;
pub mod http;
pub mod lexical;
pub mod reranker;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


use async_trait::async_trait;

pub use config::RerankConfig;
pub use error::{RerankError, RerankResult};
pub use http::HttpRerankBackend;
pub use lexical::LexicalCrossScorer;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRerankBackend;
pub use reranker::Reranker;
pub use types::{RerankOutcome, RerankStatus};

/// Joint query/passage scorer.
#[async_trait]
pub trait RerankBackend: Send + Sync {
    fn name(&self) -> &str;

    /// One score per passage, same order, each in `[0, 1]`.
    async fn score(&self, query: &str, passages: &[&str]) -> RerankResult<Vec<f32>>;
}
