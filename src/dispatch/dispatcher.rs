use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::config::DispatchConfig;
use super::error::{AttemptError, DispatchError};
use super::interceptor::{AttemptInfo, DispatchInterceptor};
use super::types::{
    AttemptRecord, DispatchOutput, DispatchPayload, DispatchRequest, DispatchResult,
};
use crate::backend::{BackendResult, CallContext, GenerateParams, ModelBackend, Operation, TokenStream};
use crate::registry::InstanceRegistry;

/// Executes embed/generate calls against the best eligible instance with bounded,
/// sequential failover across distinct instances.
pub struct Dispatcher {
    registry: Arc<InstanceRegistry>,
    config: DispatchConfig,
    interceptors: Vec<Arc<dyn DispatchInterceptor>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<InstanceRegistry>, config: DispatchConfig) -> Self {
        Self {
            registry,
            config,
            interceptors: Vec::new(),
        }
    }

    /// Appends an interceptor; interceptors run in insertion order.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn DispatchInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Generic entry point.
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchResult<DispatchOutput>, DispatchError> {
        match request.payload {
            DispatchPayload::Embed { text } => Ok(self
                .embed(&request.request_id, &text)
                .await?
                .map(DispatchOutput::Embedding)),
            DispatchPayload::Generate { prompt, params } => Ok(self
                .generate(&request.request_id, &prompt, &params)
                .await?
                .map(DispatchOutput::Text)),
        }
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn embed(
        &self,
        request_id: &str,
        text: &str,
    ) -> Result<DispatchResult<Vec<f32>>, DispatchError> {
        let text: Arc<str> = Arc::from(text);
        let expected = self.config.expected_dimension;
        self.run(
            Operation::Embed,
            request_id,
            self.config.embed_timeout,
            move |backend, ctx| {
                let text = Arc::clone(&text);
                async move { backend.embed(&ctx, &text).await }
            },
            move |embedding: &Vec<f32>| validate_embedding(embedding, expected),
        )
        .await
    }

    #[instrument(skip(self, prompt, params), fields(len = prompt.len()))]
    pub async fn generate(
        &self,
        request_id: &str,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<DispatchResult<String>, DispatchError> {
        let prompt: Arc<str> = Arc::from(prompt);
        let params = *params;
        self.run(
            Operation::Generate,
            request_id,
            self.config.generate_timeout,
            move |backend, ctx| {
                let prompt = Arc::clone(&prompt);
                async move { backend.generate(&ctx, &prompt, &params).await }
            },
            |_: &String| Ok(()),
        )
        .await
    }

    /// Failover applies until a stream is established. Errors after that are delivered
    /// through the stream and are not retried.
    #[instrument(skip(self, prompt, params), fields(len = prompt.len()))]
    pub async fn generate_stream(
        &self,
        request_id: &str,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<DispatchResult<TokenStream>, DispatchError> {
        let prompt: Arc<str> = Arc::from(prompt);
        let params = *params;
        self.run(
            Operation::Generate,
            request_id,
            self.config.generate_timeout,
            move |backend, ctx| {
                let prompt = Arc::clone(&prompt);
                async move { backend.generate_stream(&ctx, &prompt, &params).await }
            },
            |_: &TokenStream| Ok(()),
        )
        .await
    }

    async fn run<T, F, Fut, V>(
        &self,
        op: Operation,
        request_id: &str,
        timeout: Duration,
        call: F,
        validate: V,
    ) -> Result<DispatchResult<T>, DispatchError>
    where
        F: Fn(Arc<dyn ModelBackend>, CallContext) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
        V: Fn(&T) -> Result<(), String>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut tried: HashSet<String> = HashSet::new();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error = String::new();

        while attempts.len() < max_attempts {
            let Some(candidate) = self
                .registry
                .candidates(op)
                .into_iter()
                .find(|c| !tried.contains(&c.id))
            else {
                break;
            };
            tried.insert(candidate.id.clone());

            let info = AttemptInfo {
                operation: op,
                instance_id: candidate.id.clone(),
                attempt: attempts.len() + 1,
                via_fallback: false,
            };
            match self
                .attempt(&info, request_id, timeout, &call, &validate)
                .await?
            {
                Ok((output, latency)) => {
                    let retried_from = attempts.last().map(|a| a.instance_id.clone());
                    attempts.push(AttemptRecord {
                        instance_id: candidate.id.clone(),
                        latency,
                        success: true,
                        error: None,
                    });
                    return Ok(DispatchResult {
                        output,
                        instance_id: candidate.id,
                        latency,
                        attempts,
                        retried_from,
                        via_fallback: false,
                    });
                }
                Err((error, latency)) => {
                    last_error = error.to_string();
                    attempts.push(AttemptRecord {
                        instance_id: candidate.id,
                        latency,
                        success: false,
                        error: Some(last_error.clone()),
                    });
                }
            }
        }

        if attempts.is_empty() {
            return self
                .primary_fallback(op, request_id, timeout, &call, &validate)
                .await;
        }

        let untried = self
            .registry
            .candidates(op)
            .iter()
            .filter(|c| !tried.contains(&c.id))
            .count();
        if untried > 0 {
            warn!(operation = %op, attempts = attempts.len(), untried, "attempt budget exhausted");
            return Err(DispatchError::AttemptBudgetExhausted {
                operation: op,
                attempts: attempts.len(),
                untried,
                last_error,
            });
        }

        warn!(operation = %op, attempts = attempts.len(), "all instances exhausted");
        Err(DispatchError::AllInstancesExhausted {
            operation: op,
            attempts: attempts.len(),
            last_error,
        })
    }

    /// No eligible instance: one attempt against the statically configured primary.
    async fn primary_fallback<T, F, Fut, V>(
        &self,
        op: Operation,
        request_id: &str,
        timeout: Duration,
        call: &F,
        validate: &V,
    ) -> Result<DispatchResult<T>, DispatchError>
    where
        F: Fn(Arc<dyn ModelBackend>, CallContext) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
        V: Fn(&T) -> Result<(), String>,
    {
        let serves_op = self
            .registry
            .snapshot()
            .iter()
            .any(|i| i.kind.supports(op));
        if !serves_op {
            return Err(DispatchError::NoEligibleInstances { operation: op });
        }

        let primary = match self.registry.primary() {
            Some(id) if self.config.fallback_to_primary && self.registry.supports(id, op) => {
                id.to_string()
            }
            _ => {
                return Err(DispatchError::AllInstancesExhausted {
                    operation: op,
                    attempts: 0,
                    last_error: "no healthy instance".to_string(),
                });
            }
        };

        warn!(operation = %op, primary = %primary, "no eligible instance, falling back to primary");
        let info = AttemptInfo {
            operation: op,
            instance_id: primary.clone(),
            attempt: 1,
            via_fallback: true,
        };
        match self.attempt(&info, request_id, timeout, call, validate).await? {
            Ok((output, latency)) => Ok(DispatchResult {
                output,
                instance_id: primary.clone(),
                latency,
                attempts: vec![AttemptRecord {
                    instance_id: primary,
                    latency,
                    success: true,
                    error: None,
                }],
                retried_from: None,
                via_fallback: true,
            }),
            Err((error, _)) => Err(DispatchError::AllInstancesExhausted {
                operation: op,
                attempts: 1,
                last_error: error.to_string(),
            }),
        }
    }

    /// One attempt: interceptors, timed call, validation, registry feedback.
    ///
    /// The outer `Result` carries interceptor rejections, which abort the logical request.
    /// Nothing is recorded if this future is dropped mid-call.
    async fn attempt<T, F, Fut, V>(
        &self,
        info: &AttemptInfo,
        request_id: &str,
        timeout: Duration,
        call: &F,
        validate: &V,
    ) -> Result<Result<(T, Duration), (AttemptError, Duration)>, DispatchError>
    where
        F: Fn(Arc<dyn ModelBackend>, CallContext) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
        V: Fn(&T) -> Result<(), String>,
    {
        let Some(backend) = self.registry.backend(&info.instance_id) else {
            return Err(DispatchError::InstanceUnavailable {
                instance_id: info.instance_id.clone(),
                reason: "not registered".to_string(),
            });
        };
        self.registry.mark_selected(&info.instance_id);

        let mut ctx = CallContext::new(request_id);
        for interceptor in &self.interceptors {
            interceptor
                .before_attempt(&mut ctx, info)
                .await
                .map_err(|e| DispatchError::Interceptor {
                    name: interceptor.name(),
                    reason: e.reason,
                })?;
        }

        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, call(backend, ctx.clone())).await {
            Ok(Ok(output)) => match validate(&output) {
                Ok(()) => Ok(output),
                Err(reason) => Err(AttemptError::MalformedEmbedding { reason }),
            },
            Ok(Err(e)) => Err(AttemptError::Backend(e)),
            Err(_) => Err(AttemptError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        let latency = started.elapsed();

        for interceptor in &self.interceptors {
            interceptor
                .after_attempt(&ctx, info, outcome.as_ref().map(|_| ()))
                .await;
        }

        // Feedback only fails for unknown ids, which were resolved above.
        match outcome {
            Ok(output) => {
                let _ = self.registry.record_success(&info.instance_id, latency);
                debug!(
                    instance = %info.instance_id,
                    attempt = info.attempt,
                    latency_ms = latency.as_millis() as u64,
                    "attempt succeeded"
                );
                Ok(Ok((output, latency)))
            }
            Err(error) => {
                let _ = self
                    .registry
                    .record_failure(&info.instance_id, &error.to_string());
                warn!(
                    instance = %info.instance_id,
                    attempt = info.attempt,
                    error = %error,
                    "attempt failed"
                );
                Ok(Err((error, latency)))
            }
        }
    }
}

/// Rejects empty, non-finite or wrongly sized embeddings.
pub fn validate_embedding(embedding: &[f32], expected_dim: Option<usize>) -> Result<(), String> {
    if embedding.is_empty() {
        return Err("empty vector".to_string());
    }
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(format!("non-finite value at index {pos}"));
    }
    if let Some(dim) = expected_dim
        && embedding.len() != dim
    {
        return Err(format!("expected dimension {dim}, got {}", embedding.len()));
    }
    Ok(())
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
