use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::WebSearch;
use super::error::{WebSearchError, WebSearchResult};
use super::types::WebResult;

/// Scriptable [`WebSearch`] returning a fixed result list.
pub struct MockWebSearch {
    results: Mutex<Vec<WebResult>>,
    available: AtomicBool,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockWebSearch {
    pub fn new(results: Vec<WebResult>) -> Self {
        Self {
            results: Mutex::new(results),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Still reports available, but every search errors.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn search(&self, _query: &str, max_results: usize) -> WebSearchResult<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(WebSearchError::Request {
                reason: "mock web failure".to_string(),
            });
        }
        Ok(self.results.lock().iter().take(max_results).cloned().collect())
    }
}
