//! Answerability scoring that gates the knowledge-base-only route.

pub mod config;
pub mod error;
pub mod scorer;
pub mod types;


pub use config::{ConfidenceConfig, DEFAULT_HEDGE_PHRASES};
pub use error::{ConfidenceError, ConfidenceResult};
pub use scorer::ConfidenceScorer;
pub use types::{ConfidenceComponents, ConfidenceScore};
