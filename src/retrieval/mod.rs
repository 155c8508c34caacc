//! Hybrid retrieval: vector and lexical search over one passage store, fused into a
//! single deterministic ranking.

pub mod config;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod types;


pub use config::RetrievalConfig;
pub use engine::HybridRetriever;
pub use error::{RetrievalError, RetrievalResult};
pub use fusion::{FusionWeights, compare_fused, fuse, sort_fused};
pub use types::{CandidatePassage, FusionMode, RetrievalOutcome};
