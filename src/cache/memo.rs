//! Exact-match embedding memo.
//!
//! Keyed by the BLAKE3 hash of the normalized query. A hit skips the embed dispatch
//! entirely; everything downstream (semantic lookup, retrieval) still runs.

use std::sync::Arc;

use moka::sync::Cache;

use crate::hashing::hash_query;

pub struct EmbeddingMemo {
    entries: Cache<[u8; 32], Arc<Vec<f32>>>,
}

impl EmbeddingMemo {
    pub fn new(capacity: u64, ttl: std::time::Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    #[inline]
    pub fn get(&self, normalized_query: &str) -> Option<Arc<Vec<f32>>> {
        self.entries.get(&hash_query(normalized_query))
    }

    #[inline]
    pub fn insert(&self, normalized_query: &str, embedding: Vec<f32>) -> Arc<Vec<f32>> {
        let embedding = Arc::new(embedding);
        self.entries
            .insert(hash_query(normalized_query), Arc::clone(&embedding));
        embedding
    }

    #[inline]
    pub fn remove(&self, normalized_query: &str) {
        self.entries.invalidate(&hash_query(normalized_query));
    }

    #[inline]
    pub fn contains(&self, normalized_query: &str) -> bool {
        self.entries.contains_key(&hash_query(normalized_query))
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Flushes moka's pending maintenance so `len` is exact.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

impl std::fmt::Debug for EmbeddingMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingMemo")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
