//! Cross-cutting hooks around every dispatch attempt.
//!
//! Interceptors run in registration order before each attempt and observe its outcome
//! afterwards. Credentials and request correlation are handled here instead of inside
//! individual backends.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::error::{AttemptError, InterceptorError};
use crate::backend::{CallContext, Operation};

/// Identifies the attempt an interceptor is called for.
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    pub operation: Operation,
    pub instance_id: String,
    /// 1-based.
    pub attempt: usize,
    pub via_fallback: bool,
}

#[async_trait]
pub trait DispatchInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// May add headers to `ctx`. An error aborts the logical request.
    async fn before_attempt(
        &self,
        ctx: &mut CallContext,
        attempt: &AttemptInfo,
    ) -> Result<(), InterceptorError>;

    async fn after_attempt(
        &self,
        _ctx: &CallContext,
        _attempt: &AttemptInfo,
        _outcome: Result<(), &AttemptError>,
    ) {
    }
}

/// Propagates the logical request id to every instance.
#[derive(Debug, Default, Clone)]
pub struct RequestIdInterceptor;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[async_trait]
impl DispatchInterceptor for RequestIdInterceptor {
    fn name(&self) -> &'static str {
        "request_id"
    }

    async fn before_attempt(
        &self,
        ctx: &mut CallContext,
        _attempt: &AttemptInfo,
    ) -> Result<(), InterceptorError> {
        let id = ctx.request_id.clone();
        ctx.set_header(REQUEST_ID_HEADER, id);
        Ok(())
    }
}

/// Source of bearer tokens for the model-serving instances.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, InterceptorError>;

    /// Called after an instance rejected the current token.
    async fn invalidate(&self);
}

/// A fixed token. Invalidation is a no-op.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String, InterceptorError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {}
}

/// Caches a token obtained from an async refresh function until it is invalidated.
pub struct RefreshingTokenProvider<F> {
    refresh: F,
    current: RwLock<Option<String>>,
}

impl<F, Fut> RefreshingTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String, InterceptorError>> + Send,
{
    pub fn new(refresh: F) -> Self {
        Self {
            refresh,
            current: RwLock::new(None),
        }
    }
}

#[async_trait]
impl<F, Fut> TokenProvider for RefreshingTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<String, InterceptorError>> + Send,
{
    async fn token(&self) -> Result<String, InterceptorError> {
        if let Some(token) = self.current.read().clone() {
            return Ok(token);
        }
        let fresh = (self.refresh)().await?;
        *self.current.write() = Some(fresh.clone());
        Ok(fresh)
    }

    async fn invalidate(&self) {
        *self.current.write() = None;
    }
}

/// Adds `Authorization: Bearer <token>` and drops the token when an instance rejects it,
/// so the next attempt (usually on another instance) fetches a fresh one.
pub struct AuthInterceptor {
    provider: Arc<dyn TokenProvider>,
}

impl AuthInterceptor {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DispatchInterceptor for AuthInterceptor {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn before_attempt(
        &self,
        ctx: &mut CallContext,
        _attempt: &AttemptInfo,
    ) -> Result<(), InterceptorError> {
        let token = self.provider.token().await?;
        ctx.set_header("authorization", format!("Bearer {token}"));
        Ok(())
    }

    async fn after_attempt(
        &self,
        _ctx: &CallContext,
        attempt: &AttemptInfo,
        outcome: Result<(), &AttemptError>,
    ) {
        if let Err(AttemptError::Backend(e)) = outcome
            && e.is_unauthorized()
        {
            debug!(instance = %attempt.instance_id, "token rejected, invalidating");
            self.provider.invalidate().await;
        }
    }
}
