use std::time::Duration;

use super::error::{RegistryError, RegistryResult};
use crate::constants::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_PROBE_TIMEOUT_MS,
};

/// Health probing and scoring parameters.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Timeout of a single liveness probe.
    pub probe_timeout: Duration,
    /// Interval of the background health monitor.
    pub check_interval: Duration,
    /// Consecutive failures at which an instance is marked unhealthy.
    pub failure_threshold: u32,
    /// Smoothing factor of the latency moving average (weight of the newest sample).
    pub latency_alpha: f64,
    pub latency_weight: f32,
    pub failure_weight: f32,
    /// Latency at which the latency component drops to half its weight.
    pub latency_reference_ms: f64,
    /// Healthy instances scoring below this are excluded from selection.
    pub min_health_score: f32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            check_interval: Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            latency_alpha: 0.3,
            latency_weight: 0.6,
            failure_weight: 0.4,
            latency_reference_ms: 500.0,
            min_health_score: 0.1,
        }
    }
}

impl RegistryConfig {
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn min_health_score(mut self, score: f32) -> Self {
        self.min_health_score = score;
        self
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.failure_threshold == 0 {
            return Err(RegistryError::InvalidConfig {
                reason: "failure_threshold must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.latency_alpha) || self.latency_alpha == 0.0 {
            return Err(RegistryError::InvalidConfig {
                reason: format!("latency_alpha must be in (0, 1], got {}", self.latency_alpha),
            });
        }
        if self.latency_reference_ms <= 0.0 {
            return Err(RegistryError::InvalidConfig {
                reason: "latency_reference_ms must be positive".to_string(),
            });
        }
        if self.latency_weight < 0.0 || self.failure_weight < 0.0 {
            return Err(RegistryError::InvalidConfig {
                reason: "score weights must be non-negative".to_string(),
            });
        }
        if self.probe_timeout.is_zero() || self.check_interval.is_zero() {
            return Err(RegistryError::InvalidConfig {
                reason: "probe_timeout and check_interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
