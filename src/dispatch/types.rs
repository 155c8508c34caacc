use std::time::Duration;

use serde::Serialize;

use crate::backend::{GenerateParams, Operation};

/// A logical embed or generate request.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: String,
    pub payload: DispatchPayload,
}

#[derive(Debug, Clone)]
pub enum DispatchPayload {
    Embed { text: String },
    Generate { prompt: String, params: GenerateParams },
}

impl DispatchRequest {
    pub fn embed(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            payload: DispatchPayload::Embed { text: text.into() },
        }
    }

    pub fn generate(
        request_id: impl Into<String>,
        prompt: impl Into<String>,
        params: GenerateParams,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            payload: DispatchPayload::Generate {
                prompt: prompt.into(),
                params,
            },
        }
    }

    pub fn operation(&self) -> Operation {
        match self.payload {
            DispatchPayload::Embed { .. } => Operation::Embed,
            DispatchPayload::Generate { .. } => Operation::Generate,
        }
    }
}

/// Output of a generic [`super::Dispatcher::dispatch`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutput {
    Embedding(Vec<f32>),
    Text(String),
}

/// Record of one attempt against one instance.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub instance_id: String,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
    pub success: bool,
    pub error: Option<String>,
}

/// Successful dispatch with its routing trail.
#[derive(Debug, Clone)]
pub struct DispatchResult<T> {
    pub output: T,
    /// Instance that produced `output`.
    pub instance_id: String,
    /// Latency of the successful attempt.
    pub latency: Duration,
    pub attempts: Vec<AttemptRecord>,
    /// Previously attempted instance when failover occurred.
    pub retried_from: Option<String>,
    /// Served by the primary fallback because no instance was eligible.
    pub via_fallback: bool,
}

impl<T> DispatchResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DispatchResult<U> {
        DispatchResult {
            output: f(self.output),
            instance_id: self.instance_id,
            latency: self.latency,
            attempts: self.attempts,
            retried_from: self.retried_from,
            via_fallback: self.via_fallback,
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

pub(crate) mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
