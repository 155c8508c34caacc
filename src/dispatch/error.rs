use thiserror::Error;

use crate::backend::Operation;

/// Failure of one attempt against one instance.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),

    #[error("malformed embedding: {reason}")]
    MalformedEmbedding { reason: String },
}

/// Errors returned by [`super::Dispatcher`].
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// One instance failed. Handled by failover and only surfaced by single-instance calls.
    #[error("instance '{instance_id}' unavailable: {reason}")]
    InstanceUnavailable { instance_id: String, reason: String },

    /// Every distinct eligible instance (and the primary fallback, if enabled) failed.
    #[error("all instances exhausted for {operation} after {attempts} attempt(s): {last_error}")]
    AllInstancesExhausted {
        operation: Operation,
        attempts: usize,
        last_error: String,
    },

    /// `max_attempts` was reached while untried eligible instances remained.
    #[error(
        "attempt budget exhausted for {operation} after {attempts} attempt(s) ({untried} instance(s) untried): {last_error}"
    )]
    AttemptBudgetExhausted {
        operation: Operation,
        attempts: usize,
        untried: usize,
        last_error: String,
    },

    /// No registered instance serves this operation at all.
    #[error("no instance serves {operation}")]
    NoEligibleInstances { operation: Operation },

    #[error("interceptor '{name}' rejected the call: {reason}")]
    Interceptor { name: &'static str, reason: String },
}

impl DispatchError {
    /// Instance-side failures, as opposed to configuration or interceptor errors.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            DispatchError::AllInstancesExhausted { .. }
                | DispatchError::AttemptBudgetExhausted { .. }
                | DispatchError::InstanceUnavailable { .. }
        )
    }
}

/// Error returned by an interceptor's `before_attempt` hook.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct InterceptorError {
    pub reason: String,
}

impl InterceptorError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
