//! Model-serving backend contract.
//!
//! Every configured instance is reached through a [`ModelBackend`]. The dispatcher owns
//! timeouts and retries; implementations only translate one call into one request.

pub mod error;
pub mod http;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


use async_trait::async_trait;

pub use error::{BackendError, BackendResult};
pub use http::HttpModelBackend;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MOCK_EMBEDDING_DIM, MockModelBackend, bag_of_words_embedding};
pub use types::{CallContext, GenerateParams, InstanceKind, Operation, TokenStream};

/// One model-serving instance (embedding and/or generation).
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Human-readable name, usually the base URL.
    fn name(&self) -> &str;

    /// Lightweight liveness call.
    async fn healthcheck(&self, ctx: &CallContext) -> BackendResult<()>;

    async fn embed(&self, ctx: &CallContext, text: &str) -> BackendResult<Vec<f32>>;

    async fn generate(
        &self,
        ctx: &CallContext,
        prompt: &str,
        params: &GenerateParams,
    ) -> BackendResult<String>;

    /// Resolves once the stream is established; later failures arrive as stream items.
    async fn generate_stream(
        &self,
        ctx: &CallContext,
        prompt: &str,
        params: &GenerateParams,
    ) -> BackendResult<TokenStream>;
}
