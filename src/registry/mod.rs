//! Instance registry and background health monitor.
//!
//! The registry is the only owner of per-instance health state. It is mutated by three
//! things: probe results, dispatch feedback and explicit overrides via
//! [`InstanceRegistry::set_health`].

pub mod config;
pub mod error;
pub mod instances;
pub mod monitor;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use instances::InstanceRegistry;
pub use monitor::HealthMonitor;
pub use types::{Candidate, HealthResult, Instance, InstanceSpec, RegistryHealth};
