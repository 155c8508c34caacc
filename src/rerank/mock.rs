use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RerankBackend;
use super::error::{RerankError, RerankResult};

/// Scriptable [`RerankBackend`]. Scores passages by a fixed table keyed on content, with
/// `default_score` for anything not listed.
pub struct MockRerankBackend {
    scores: Mutex<Vec<(String, f32)>>,
    default_score: f32,
    delay: Mutex<Duration>,
    failing: AtomicBool,
    short_by: AtomicUsize,
    calls: AtomicUsize,
}

impl MockRerankBackend {
    pub fn new(default_score: f32) -> Self {
        Self {
            scores: Mutex::new(Vec::new()),
            default_score,
            delay: Mutex::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            short_by: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_score(self, content: impl Into<String>, score: f32) -> Self {
        self.scores.lock().push((content.into(), score));
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Returns `n` fewer scores than passages.
    pub fn set_short_by(&self, n: usize) {
        self.short_by.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RerankBackend for MockRerankBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn score(&self, _query: &str, passages: &[&str]) -> RerankResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RerankError::Backend {
                reason: "mock rerank failure".to_string(),
            });
        }
        let table = self.scores.lock().clone();
        let mut scores: Vec<f32> = passages
            .iter()
            .map(|p| {
                table
                    .iter()
                    .find(|(content, _)| content == p)
                    .map(|(_, s)| *s)
                    .unwrap_or(self.default_score)
            })
            .collect();
        let short = self.short_by.load(Ordering::SeqCst).min(scores.len());
        scores.truncate(scores.len() - short);
        Ok(scores)
    }
}
