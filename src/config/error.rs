//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A variable was set but its value could not be used.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// One `SLUICE_INSTANCES` entry is malformed.
    #[error("invalid instance entry '{entry}': {reason}")]
    InvalidInstance { entry: String, reason: String },

    #[error("no model-serving instances configured")]
    NoInstances,

    #[error("duplicate instance id '{id}'")]
    DuplicateInstance { id: String },

    #[error("primary instance '{id}' is not among the configured instances")]
    UnknownPrimary { id: String },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Cross-field check failed (thresholds, cache bounds and the like).
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}
