use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::error::BackendResult;

/// The two operations a model-serving instance can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Embed,
    Generate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Embed => "embed",
            Operation::Generate => "generate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which operations an instance serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Embedding,
    Generation,
    Both,
}

impl InstanceKind {
    #[inline]
    pub fn supports(&self, op: Operation) -> bool {
        matches!(
            (self, op),
            (InstanceKind::Both, _)
                | (InstanceKind::Embedding, Operation::Embed)
                | (InstanceKind::Generation, Operation::Generate)
        )
    }
}

impl FromStr for InstanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" | "embed" => Ok(InstanceKind::Embedding),
            "generation" | "generate" => Ok(InstanceKind::Generation),
            "both" | "" => Ok(InstanceKind::Both),
            other => Err(format!("unknown instance kind '{other}'")),
        }
    }
}

/// Sampling parameters forwarded to `generate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

/// Per-attempt call metadata. Interceptors write headers here before the call goes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub request_id: String,
    pub headers: BTreeMap<String, String>,
}

impl CallContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Incremental generation output.
pub type TokenStream = BoxStream<'static, BackendResult<String>>;
