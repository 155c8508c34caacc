//! In-process backend for tests and local runs without a model server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;

use super::ModelBackend;
use super::error::{BackendError, BackendResult};
use super::types::{CallContext, GenerateParams, TokenStream};
use crate::hashing::hash_to_u64;
use crate::text::content_terms;

/// Default dimension of [`bag_of_words_embedding`].
pub const MOCK_EMBEDDING_DIM: usize = 512;

/// Deterministic hashed bag-of-words embedding, L2-normalized.
///
/// Texts sharing content terms get positive cosine similarity; texts with disjoint terms
/// are orthogonal unless two terms land in the same bucket. All-stop-word input yields the
/// zero vector.
pub fn bag_of_words_embedding(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim.max(1)];
    for term in content_terms(text) {
        let bucket = (hash_to_u64(term.as_bytes()) % vector.len() as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Scriptable [`ModelBackend`].
pub struct MockModelBackend {
    name: String,
    dim: usize,
    response: Mutex<String>,
    latency: Mutex<Duration>,
    down: AtomicBool,
    malformed_embeddings: AtomicBool,
    fail_remaining: AtomicUsize,
    unauthorized_remaining: AtomicUsize,
    embed_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    health_calls: AtomicUsize,
    seen_headers: Mutex<Vec<BTreeMap<String, String>>>,
    last_prompt: Mutex<Option<String>>,
}

impl MockModelBackend {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            response: Mutex::new(format!("answer from {name}")),
            name,
            dim: MOCK_EMBEDDING_DIM,
            latency: Mutex::new(Duration::ZERO),
            down: AtomicBool::new(false),
            malformed_embeddings: AtomicBool::new(false),
            fail_remaining: AtomicUsize::new(0),
            unauthorized_remaining: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            seen_headers: Mutex::new(Vec::new()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        *self.response.lock() = response.into();
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Every call (including health checks) fails while down.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// The next `n` embed/generate calls fail with [`BackendError::Unreachable`].
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// The next `n` embed/generate calls fail with [`BackendError::Unauthorized`].
    pub fn reject_next(&self, n: usize) {
        self.unauthorized_remaining.store(n, Ordering::SeqCst);
    }

    /// Embeddings come back containing NaN.
    pub fn set_malformed_embeddings(&self, malformed: bool) {
        self.malformed_embeddings.store(malformed, Ordering::SeqCst);
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Headers observed on every embed/generate call, in call order.
    pub fn seen_headers(&self) -> Vec<BTreeMap<String, String>> {
        self.seen_headers.lock().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }

    async fn simulate(&self, ctx: &CallContext) -> BackendResult<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.seen_headers.lock().push(ctx.headers.clone());

        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable {
                reason: format!("{} is down", self.name),
            });
        }
        if take_one(&self.unauthorized_remaining) {
            return Err(BackendError::Unauthorized);
        }
        if take_one(&self.fail_remaining) {
            return Err(BackendError::Unreachable {
                reason: format!("{} injected failure", self.name),
            });
        }
        Ok(())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl std::fmt::Debug for MockModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockModelBackend")
            .field("name", &self.name)
            .field("down", &self.down.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl ModelBackend for MockModelBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn healthcheck(&self, _ctx: &CallContext) -> BackendResult<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable {
                reason: format!("{} is down", self.name),
            });
        }
        Ok(())
    }

    async fn embed(&self, ctx: &CallContext, text: &str) -> BackendResult<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate(ctx).await?;
        let mut embedding = bag_of_words_embedding(text, self.dim);
        if self.malformed_embeddings.load(Ordering::SeqCst) {
            embedding[0] = f32::NAN;
        }
        Ok(embedding)
    }

    async fn generate(
        &self,
        ctx: &CallContext,
        prompt: &str,
        _params: &GenerateParams,
    ) -> BackendResult<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate(ctx).await?;
        *self.last_prompt.lock() = Some(prompt.to_string());
        Ok(self.response.lock().clone())
    }

    async fn generate_stream(
        &self,
        ctx: &CallContext,
        prompt: &str,
        _params: &GenerateParams,
    ) -> BackendResult<TokenStream> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate(ctx).await?;
        *self.last_prompt.lock() = Some(prompt.to_string());

        let response = self.response.lock().clone();
        let tokens: Vec<BackendResult<String>> = response
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(stream::iter(tokens).boxed())
    }
}
