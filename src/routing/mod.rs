//! Confidence-gated route selection: knowledge base only, blended, or web only.

pub mod config;
pub mod engine;
pub mod error;
pub mod types;


pub use config::RoutingThresholds;
pub use engine::RoutingEngine;
pub use error::{RoutingError, RoutingResult};
pub use types::{Route, RouteDecision, RouteReason};
