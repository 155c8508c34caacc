//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `SLUICE_*` environment variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::collections::HashSet;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backend::InstanceKind;
use crate::cache::CacheConfig;
use crate::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_SIMILARITY_THRESHOLD, DEFAULT_CACHE_TTL_SECS,
    DEFAULT_EMBED_MODEL, DEFAULT_FAILURE_THRESHOLD, DEFAULT_GENERATE_MODEL,
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_DEADLINE_MS,
};
use crate::dispatch::DispatchConfig;
use crate::engine::EngineConfig;
use crate::registry::{InstanceSpec, RegistryConfig};
use crate::routing::RoutingThresholds;

/// Instance list used when `SLUICE_INSTANCES` is not set: one local Ollama.
pub const DEFAULT_INSTANCES: &str = "local=http://localhost:11434";

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SLUICE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Model-serving instances, parsed from `id=url[|kind]` entries separated by commas.
    pub instances: Vec<InstanceSpec>,

    /// Instance tried when none is healthy. Default: the first instance.
    pub primary_instance: Option<String>,

    pub embed_model: String,
    pub generate_model: String,

    /// Bearer token attached to every backend call.
    pub api_token: Option<String>,

    /// JSONL knowledge file. Without one the knowledge base is empty.
    pub kb_path: Option<PathBuf>,

    /// SearxNG base URL. Without one web search is disabled.
    pub searxng_url: Option<String>,

    /// TEI-compatible rerank service. Without one the local lexical scorer is used.
    pub rerank_url: Option<String>,

    pub high_threshold: f32,
    pub low_threshold: f32,

    pub cache_similarity: f32,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,

    pub health_check_interval: Duration,
    pub failure_threshold: u32,
    pub max_attempts: usize,
    pub request_deadline: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            instances: vec![InstanceSpec::new(
                "local",
                "http://localhost:11434",
                InstanceKind::Both,
            )],
            primary_instance: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            generate_model: DEFAULT_GENERATE_MODEL.to_string(),
            api_token: None,
            kb_path: None,
            searxng_url: None,
            rerank_url: None,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            cache_similarity: DEFAULT_CACHE_SIMILARITY_THRESHOLD,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            health_check_interval: Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_deadline: Duration::from_millis(DEFAULT_REQUEST_DEADLINE_MS),
        }
    }
}

impl Config {
    pub const ENV_PORT: &'static str = "SLUICE_PORT";
    const ENV_BIND_ADDR: &'static str = "SLUICE_BIND_ADDR";
    const ENV_INSTANCES: &'static str = "SLUICE_INSTANCES";
    const ENV_PRIMARY_INSTANCE: &'static str = "SLUICE_PRIMARY_INSTANCE";
    const ENV_EMBED_MODEL: &'static str = "SLUICE_EMBED_MODEL";
    const ENV_GENERATE_MODEL: &'static str = "SLUICE_GENERATE_MODEL";
    const ENV_API_TOKEN: &'static str = "SLUICE_API_TOKEN";
    const ENV_KB_PATH: &'static str = "SLUICE_KB_PATH";
    const ENV_SEARXNG_URL: &'static str = "SLUICE_SEARXNG_URL";
    const ENV_RERANK_URL: &'static str = "SLUICE_RERANK_URL";
    const ENV_HIGH_THRESHOLD: &'static str = "SLUICE_HIGH_THRESHOLD";
    const ENV_LOW_THRESHOLD: &'static str = "SLUICE_LOW_THRESHOLD";
    const ENV_CACHE_SIMILARITY: &'static str = "SLUICE_CACHE_SIMILARITY";
    const ENV_CACHE_CAPACITY: &'static str = "SLUICE_CACHE_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "SLUICE_CACHE_TTL_SECS";
    const ENV_HEALTH_INTERVAL_SECS: &'static str = "SLUICE_HEALTH_INTERVAL_SECS";
    const ENV_FAILURE_THRESHOLD: &'static str = "SLUICE_FAILURE_THRESHOLD";
    const ENV_MAX_ATTEMPTS: &'static str = "SLUICE_MAX_ATTEMPTS";
    const ENV_REQUEST_DEADLINE_MS: &'static str = "SLUICE_REQUEST_DEADLINE_MS";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let instances = match Self::parse_optional_string_from_env(Self::ENV_INSTANCES) {
            Some(value) => parse_instances(&value)?,
            None => defaults.instances,
        };

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            instances,
            primary_instance: Self::parse_optional_string_from_env(Self::ENV_PRIMARY_INSTANCE),
            embed_model: Self::parse_string_from_env(Self::ENV_EMBED_MODEL, defaults.embed_model),
            generate_model: Self::parse_string_from_env(
                Self::ENV_GENERATE_MODEL,
                defaults.generate_model,
            ),
            api_token: Self::parse_optional_string_from_env(Self::ENV_API_TOKEN),
            kb_path: Self::parse_optional_string_from_env(Self::ENV_KB_PATH).map(PathBuf::from),
            searxng_url: Self::parse_optional_string_from_env(Self::ENV_SEARXNG_URL),
            rerank_url: Self::parse_optional_string_from_env(Self::ENV_RERANK_URL),
            high_threshold: Self::parse_from_env(Self::ENV_HIGH_THRESHOLD, defaults.high_threshold)?,
            low_threshold: Self::parse_from_env(Self::ENV_LOW_THRESHOLD, defaults.low_threshold)?,
            cache_similarity: Self::parse_from_env(
                Self::ENV_CACHE_SIMILARITY,
                defaults.cache_similarity,
            )?,
            cache_capacity: Self::parse_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity)?,
            cache_ttl: Duration::from_secs(Self::parse_from_env(
                Self::ENV_CACHE_TTL_SECS,
                defaults.cache_ttl.as_secs(),
            )?),
            health_check_interval: Duration::from_secs(Self::parse_from_env(
                Self::ENV_HEALTH_INTERVAL_SECS,
                defaults.health_check_interval.as_secs(),
            )?),
            failure_threshold: Self::parse_from_env(
                Self::ENV_FAILURE_THRESHOLD,
                defaults.failure_threshold,
            )?,
            max_attempts: Self::parse_from_env(Self::ENV_MAX_ATTEMPTS, defaults.max_attempts)?,
            request_deadline: Duration::from_millis(Self::parse_from_env(
                Self::ENV_REQUEST_DEADLINE_MS,
                defaults.request_deadline.as_millis() as u64,
            )?),
        })
    }

    /// Validates cross-field invariants and the knowledge file path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }
        let mut seen = HashSet::new();
        for spec in &self.instances {
            if !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateInstance {
                    id: spec.id.clone(),
                });
            }
        }
        if let Some(primary) = &self.primary_instance
            && !seen.contains(primary.as_str())
        {
            return Err(ConfigError::UnknownPrimary {
                id: primary.clone(),
            });
        }

        if let Some(path) = &self.kb_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        self.thresholds()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        self.cache_config()
            .validate()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        self.registry_config()
            .validate()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        self.engine_config()
            .validate()
            .map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn thresholds(&self) -> crate::routing::RoutingResult<RoutingThresholds> {
        RoutingThresholds::new(self.low_threshold, self.high_threshold)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .similarity_threshold(self.cache_similarity)
            .capacity(self.cache_capacity)
            .ttl(self.cache_ttl)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .check_interval(self.health_check_interval)
            .failure_threshold(self.failure_threshold)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::default().max_attempts(self.max_attempts)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().deadline(self.request_deadline)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        Self::parse_optional_string_from_env(var_name).unwrap_or(default)
    }

    /// Unset and blank are both `None`.
    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                name: var_name,
                reason: e.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }
}

/// Parses `id=url[|kind],id=url[|kind],...`. Kind defaults to `both`.
pub fn parse_instances(value: &str) -> Result<Vec<InstanceSpec>, ConfigError> {
    let mut specs = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let invalid = |reason: &str| ConfigError::InvalidInstance {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };
        let (id, rest) = entry
            .split_once('=')
            .ok_or_else(|| invalid("expected id=url"))?;
        let (url, kind) = match rest.split_once('|') {
            Some((url, kind)) => (url, kind.parse::<InstanceKind>().map_err(|e| invalid(&e))?),
            None => (rest, InstanceKind::Both),
        };
        let (id, url) = (id.trim(), url.trim());
        if id.is_empty() {
            return Err(invalid("empty id"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("url must start with http:// or https://"));
        }
        specs.push(InstanceSpec::new(id, url, kind));
    }
    if specs.is_empty() {
        return Err(ConfigError::NoInstances);
    }
    Ok(specs)
}
