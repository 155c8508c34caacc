//! Two-tier response cache.
//!
//! - **Memo** ([`EmbeddingMemo`]): exact match on the normalized query, stores embeddings so
//!   repeated queries skip the embed dispatch.
//! - **Semantic** ([`SemanticCache`]): cosine similarity over query embeddings, stores
//!   finished answers. Capacity is enforced on every insert; a background sweeper removes
//!   expired entries.
//!
//! Entries only match requests with the same option fingerprint (`variant`).

pub mod config;
pub mod error;
pub mod memo;
pub mod semantic;
pub mod tiered;
pub mod types;


pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use memo::EmbeddingMemo;
pub use semantic::SemanticCache;
pub use tiered::ResponseCache;
pub use types::{CacheEntry, CacheHit, CacheStats, CacheStatus, SLUICE_CACHE_HEADER};
