use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::error::CacheResult;
use super::memo::EmbeddingMemo;
use super::semantic::SemanticCache;

/// Both cache tiers plus the background TTL sweeper.
pub struct ResponseCache<T> {
    memo: EmbeddingMemo,
    semantic: Arc<SemanticCache<T>>,
    sweeper_running: Arc<AtomicBool>,
    sweeper_shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<T: Clone + Send + Sync + 'static> ResponseCache<T> {
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let memo = EmbeddingMemo::new(config.memo_capacity, config.memo_ttl);
        Ok(Self {
            memo,
            semantic: Arc::new(SemanticCache::new(config)?),
            sweeper_running: Arc::new(AtomicBool::new(false)),
            sweeper_shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        })
    }

    #[inline]
    pub fn memo(&self) -> &EmbeddingMemo {
        &self.memo
    }

    #[inline]
    pub fn semantic(&self) -> &SemanticCache<T> {
        &self.semantic
    }

    /// Starts the TTL sweeper (no-op if already running).
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        // AcqRel: only one caller may flip running from false to true.
        if self.sweeper_running.swap(true, Ordering::AcqRel) {
            return tokio::spawn(async {});
        }
        self.sweeper_shutdown.store(false, Ordering::Release);

        let semantic = Arc::clone(&self.semantic);
        let running = Arc::clone(&self.sweeper_running);
        let shutdown = Arc::clone(&self.sweeper_shutdown);
        let wake = Arc::clone(&self.wake);
        let period = semantic.config().sweep_interval;

        tokio::spawn(async move {
            info!(interval = ?period, "cache sweeper started");
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                // Acquire: pairs with the Release store in stop_sweeper().
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                let removed = semantic.sweep();
                debug!(removed, remaining = semantic.len(), "sweep complete");
            }
            running.store(false, Ordering::Release);
        })
    }

    pub fn stop_sweeper(&self) {
        self.sweeper_shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper_running.load(Ordering::Acquire)
    }
}

impl<T> Drop for ResponseCache<T> {
    fn drop(&mut self) {
        self.sweeper_shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("memo", &self.memo)
            .field("semantic", &self.semantic)
            .finish()
    }
}
