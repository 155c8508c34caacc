use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::config::RegistryConfig;
use super::error::{RegistryError, RegistryResult};
use super::types::{Candidate, HealthResult, Instance, InstanceSpec, RegistryHealth};
use crate::backend::{CallContext, ModelBackend, Operation};

/// Authoritative health and load table for every configured model-serving instance.
///
/// Shared by `Arc`. Reads take a shared lock on the table; probes and dispatch feedback
/// take the exclusive lock only for the duration of a field update.
pub struct InstanceRegistry {
    config: RegistryConfig,
    table: RwLock<Vec<Instance>>,
    backends: HashMap<String, Arc<dyn ModelBackend>>,
    primary: Option<String>,
    selection_seq: AtomicU64,
}

impl InstanceRegistry {
    /// Builds a registry. `primary` defaults to the first member when `None`.
    pub fn new(
        config: RegistryConfig,
        members: Vec<(InstanceSpec, Arc<dyn ModelBackend>)>,
        primary: Option<String>,
    ) -> RegistryResult<Self> {
        config.validate()?;
        if members.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut table = Vec::with_capacity(members.len());
        let mut backends = HashMap::with_capacity(members.len());
        for (spec, backend) in members {
            if backends.contains_key(&spec.id) {
                return Err(RegistryError::DuplicateInstance { id: spec.id });
            }
            backends.insert(spec.id.clone(), backend);
            table.push(Instance::from_spec(spec));
        }

        let primary = match primary {
            Some(id) if !backends.contains_key(&id) => {
                return Err(RegistryError::UnknownPrimary { id });
            }
            Some(id) => Some(id),
            None => table.first().map(|i| i.id.clone()),
        };

        Ok(Self {
            config,
            table: RwLock::new(table),
            backends,
            primary,
            selection_seq: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Statically configured fallback instance.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn backend(&self, id: &str) -> Option<Arc<dyn ModelBackend>> {
        self.backends.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.table.read().iter().map(|i| i.id.clone()).collect()
    }

    /// Copy of one instance with a freshly computed score.
    pub fn instance(&self, id: &str) -> Option<Instance> {
        let table = self.table.read();
        table.iter().find(|i| i.id == id).map(|i| self.scored(i))
    }

    /// Copies of every instance with freshly computed scores, in registration order.
    pub fn snapshot(&self) -> Vec<Instance> {
        self.table.read().iter().map(|i| self.scored(i)).collect()
    }

    /// Current composite score; `0.0` for unhealthy instances.
    pub fn score(&self, id: &str) -> Option<f32> {
        let table = self.table.read();
        table.iter().find(|i| i.id == id).map(|i| self.compute_score(i))
    }

    /// Whether `id` is registered and serves `op`.
    pub fn supports(&self, id: &str, op: Operation) -> bool {
        self.table
            .read()
            .iter()
            .any(|i| i.id == id && i.kind.supports(op))
    }

    /// Eligible instances for `op`, best first.
    ///
    /// Eligible means healthy, kind-compatible and scoring at least `min_health_score`.
    /// Equal scores go to the least recently selected instance.
    pub fn candidates(&self, op: Operation) -> Vec<Candidate> {
        let table = self.table.read();
        let mut ranked: Vec<(Candidate, u64)> = table
            .iter()
            .filter(|i| i.healthy && i.kind.supports(op))
            .map(|i| {
                (
                    Candidate {
                        id: i.id.clone(),
                        score: self.compute_score(i),
                    },
                    i.last_selected_seq,
                )
            })
            .filter(|(c, _)| c.score >= self.config.min_health_score)
            .collect();

        ranked.sort_by(|(a, a_seq), (b, b_seq)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_seq.cmp(b_seq))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.into_iter().map(|(c, _)| c).collect()
    }

    /// Stamps `id` as the most recently selected instance.
    pub fn mark_selected(&self, id: &str) {
        let seq = self.selection_seq.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(instance) = self.table.write().iter_mut().find(|i| i.id == id) {
            instance.last_selected_seq = seq;
        }
    }

    /// Explicit health override. Marking healthy also clears the failure streak.
    pub fn set_health(&self, id: &str, healthy: bool) -> RegistryResult<()> {
        self.update(id, |instance| {
            instance.healthy = healthy;
            if healthy {
                instance.consecutive_failures = 0;
            }
        })?;
        info!(instance = id, healthy, "instance health overridden");
        Ok(())
    }

    /// Dispatch or probe success: folds `latency` into the moving average and resets
    /// the failure streak.
    pub fn record_success(&self, id: &str, latency: Duration) -> RegistryResult<()> {
        let alpha = self.config.latency_alpha;
        let sample = latency.as_secs_f64() * 1_000.0;
        self.update(id, |instance| {
            instance.avg_latency_ms = if instance.total_successes == 0 {
                sample
            } else {
                alpha * sample + (1.0 - alpha) * instance.avg_latency_ms
            };
            instance.total_successes += 1;
            instance.consecutive_failures = 0;
            instance.last_error = None;
            if !instance.healthy {
                info!(instance = %instance.id, "instance recovered");
            }
            instance.healthy = true;
        })
    }

    /// Dispatch or probe failure. Returns `true` if this failure made the instance unhealthy.
    pub fn record_failure(&self, id: &str, reason: &str) -> RegistryResult<bool> {
        let threshold = self.config.failure_threshold;
        let mut tripped = false;
        self.update(id, |instance| {
            instance.consecutive_failures = instance.consecutive_failures.saturating_add(1);
            instance.total_failures += 1;
            instance.last_error = Some(reason.to_string());
            if instance.healthy && instance.consecutive_failures >= threshold {
                instance.healthy = false;
                tripped = true;
            }
        })?;
        if tripped {
            warn!(instance = id, reason, "instance marked unhealthy");
        }
        Ok(tripped)
    }

    /// Issues one liveness call against `id` under the probe timeout.
    #[instrument(skip(self), fields(instance = id))]
    pub async fn probe(&self, id: &str) -> RegistryResult<HealthResult> {
        let backend = self
            .backend(id)
            .ok_or_else(|| RegistryError::UnknownInstance { id: id.to_string() })?;

        let ctx = CallContext::new(format!("probe-{id}"));
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.probe_timeout, backend.healthcheck(&ctx)).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(Ok(())) => {
                self.record_success(id, elapsed)?;
                let latency_ms = elapsed.as_secs_f64() * 1_000.0;
                debug!(latency_ms, "probe succeeded");
                HealthResult::Healthy { latency_ms }
            }
            Ok(Err(e)) => self.probe_failed(id, e.to_string())?,
            Err(_) => self.probe_failed(
                id,
                format!("probe timed out after {:?}", self.config.probe_timeout),
            )?,
        };

        self.update(id, |instance| instance.last_checked_at = Some(Utc::now()))?;
        Ok(result)
    }

    fn probe_failed(&self, id: &str, reason: String) -> RegistryResult<HealthResult> {
        self.record_failure(id, &reason)?;
        let instance = self
            .instance(id)
            .ok_or_else(|| RegistryError::UnknownInstance { id: id.to_string() })?;
        debug!(reason = %reason, failures = instance.consecutive_failures, "probe failed");
        Ok(HealthResult::Unhealthy {
            reason,
            consecutive_failures: instance.consecutive_failures,
            still_healthy: instance.healthy,
        })
    }

    /// Probes every instance concurrently.
    pub async fn probe_all(&self) -> Vec<(String, HealthResult)> {
        let ids = self.ids();
        let results = join_all(ids.iter().map(|id| self.probe(id))).await;
        ids.into_iter()
            .zip(results)
            .filter_map(|(id, r)| r.ok().map(|h| (id, h)))
            .collect()
    }

    pub fn health(&self) -> RegistryHealth {
        let table = self.table.read();
        let total = table.len();
        let healthy = table.iter().filter(|i| i.healthy).count();
        match healthy {
            0 => RegistryHealth::AllUnhealthy { total },
            h if h == total => RegistryHealth::Healthy { total },
            h => RegistryHealth::Degraded { healthy: h, total },
        }
    }

    fn update<F>(&self, id: &str, f: F) -> RegistryResult<()>
    where
        F: FnOnce(&mut Instance),
    {
        let mut table = self.table.write();
        let instance = table
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| RegistryError::UnknownInstance { id: id.to_string() })?;
        f(instance);
        Ok(())
    }

    fn scored(&self, instance: &Instance) -> Instance {
        let mut copy = instance.clone();
        copy.score = self.compute_score(instance);
        copy
    }

    fn compute_score(&self, instance: &Instance) -> f32 {
        if !instance.healthy {
            return 0.0;
        }
        let latency = instance.avg_latency_ms.max(0.0);
        let latency_part =
            self.config.latency_weight as f64 / (1.0 + latency / self.config.latency_reference_ms);
        let failure_part =
            self.config.failure_weight / (1.0 + instance.consecutive_failures as f32);
        latency_part as f32 + failure_part
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("instances", &self.len())
            .field("primary", &self.primary)
            .field("health", &self.health())
            .finish()
    }
}
