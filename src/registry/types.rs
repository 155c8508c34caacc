use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::InstanceKind;

/// Static description of one configured instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub id: String,
    pub base_url: String,
    pub kind: InstanceKind,
}

impl InstanceSpec {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, kind: InstanceKind) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            kind,
        }
    }
}

/// Health and load state of one instance.
///
/// Copies handed out by the registry carry a `score` computed at read time.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub id: String,
    pub base_url: String,
    pub kind: InstanceKind,
    pub healthy: bool,
    pub avg_latency_ms: f64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
    pub score: f32,
    #[serde(skip)]
    pub(crate) last_selected_seq: u64,
}

impl Instance {
    pub(crate) fn from_spec(spec: InstanceSpec) -> Self {
        Self {
            id: spec.id,
            base_url: spec.base_url,
            kind: spec.kind,
            healthy: true,
            avg_latency_ms: 0.0,
            last_checked_at: None,
            consecutive_failures: 0,
            total_successes: 0,
            total_failures: 0,
            last_error: None,
            score: 0.0,
            last_selected_seq: 0,
        }
    }
}

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthResult {
    Healthy {
        latency_ms: f64,
    },
    Unhealthy {
        reason: String,
        consecutive_failures: u32,
        /// Whether the instance is still eligible (threshold not yet reached).
        still_healthy: bool,
    },
}

impl HealthResult {
    #[inline]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthResult::Healthy { .. })
    }
}

/// Aggregate registry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryHealth {
    Healthy { total: usize },
    Degraded { healthy: usize, total: usize },
    /// Non-fatal: callers fall back to the configured primary instance.
    AllUnhealthy { total: usize },
}

impl RegistryHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryHealth::Healthy { .. } => "healthy",
            RegistryHealth::Degraded { .. } => "degraded",
            RegistryHealth::AllUnhealthy { .. } => "all_unhealthy",
        }
    }
}

/// An instance eligible for an operation, as ranked by [`super::InstanceRegistry::candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub score: f32,
}
