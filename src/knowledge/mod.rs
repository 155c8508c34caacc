//! Passage store consumed by hybrid retrieval.
//!
//! [`KnowledgeStore`] is the seam: anything that can answer a vector query and a lexical
//! query over the same passages. [`InMemoryKnowledgeStore`] is the bundled implementation
//! (cosine over stored vectors, BM25 over content terms), loadable from JSON Lines.

pub mod error;
pub mod memory;
pub mod types;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

pub use error::{KnowledgeError, KnowledgeResult};
pub use memory::{BM25_B, BM25_K1, InMemoryKnowledgeStore};
pub use types::{Passage, StoreHit};

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    fn name(&self) -> &str;

    /// Top `k` passages by vector similarity to `embedding`, best first.
    async fn vector_search(&self, embedding: &[f32], k: usize) -> KnowledgeResult<Vec<StoreHit>>;

    /// Top `k` passages by term-frequency relevance to `text`, best first. Passages with no
    /// matching term are not returned.
    async fn lexical_search(&self, text: &str, k: usize) -> KnowledgeResult<Vec<StoreHit>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
