use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use super::instances::InstanceRegistry;

/// Background task probing every instance on the registry's `check_interval`.
///
/// Runs independently of request traffic. The first round fires immediately.
pub struct HealthMonitor {
    registry: Arc<InstanceRegistry>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self {
            registry,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the probe loop (no-op if already running).
    pub fn start(&self) -> JoinHandle<()> {
        // AcqRel: only one caller may flip running from false to true.
        if self.running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }
        self.shutdown.store(false, Ordering::Release);

        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let period = registry.config().check_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "health monitor started");
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                // Acquire: pairs with the Release store in stop().
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let results = registry.probe_all().await;
                let healthy = results.iter().filter(|(_, r)| r.is_healthy()).count();
                debug!(probed = results.len(), healthy, "health round complete");
            }
            // Release: a later start() observing false also observes the finished loop.
            running.store(false, Ordering::Release);
            info!("health monitor stopped");
        })
    }

    /// Requests the loop to exit after the current round.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
