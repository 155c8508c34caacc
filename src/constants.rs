//! Cross-cutting defaults shared by the routing, retrieval and cache layers.
//!
//! Every value here is only a default. The corresponding config structs accept overrides
//! and `Config::from_env` maps `SLUICE_*` variables onto them.

/// Confidence at or above which an answer is served from the knowledge base alone.
pub const DEFAULT_HIGH_THRESHOLD: f32 = 0.5;
/// Confidence below which the knowledge base is skipped in favour of web search.
pub const DEFAULT_LOW_THRESHOLD: f32 = 0.15;

pub const DEFAULT_CACHE_SIMILARITY_THRESHOLD: f32 = 0.85;
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MEMO_CAPACITY: u64 = 10_000;

pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;
/// Consecutive failures after which an instance is marked unhealthy.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// One initial attempt plus two failovers.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_EMBED_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GENERATE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 60_000;

pub const DEFAULT_RETRIEVAL_TOP_N: usize = 20;
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;
pub const DEFAULT_LEXICAL_WEIGHT: f32 = 0.3;
pub const DEFAULT_MIN_VECTOR_SIMILARITY: f32 = 0.35;
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_RERANK_TOP_K: usize = 10;
pub const DEFAULT_RERANK_TIMEOUT_MS: u64 = 2_000;

pub const DEFAULT_WEB_MAX_RESULTS: usize = 5;
pub const DEFAULT_WEB_TIMEOUT_MS: u64 = 8_000;

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_GENERATE_MODEL: &str = "llama3.1";
