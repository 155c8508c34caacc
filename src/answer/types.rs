use serde::Serialize;

use crate::backend::TokenStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Kb,
    Web,
}

impl CitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationKind::Kb => "kb",
            CitationKind::Web => "web",
        }
    }
}

/// A source as numbered in the generation context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// 1-based, matches the `[n]` marker in the context.
    pub index: usize,
    pub kind: CitationKind,
    /// Passage id for `kb`, URL for `web`.
    pub reference: String,
    pub title: String,
    pub snippet: String,
}

/// The numbered source blocks handed to generation and their citations, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Some source was shortened or dropped to fit the budget.
    pub truncated: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AssembledAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Instance that generated `text`; `None` for the insufficient-knowledge reply.
    pub instance_id: Option<String>,
    pub insufficient_knowledge: bool,
    /// Served by the primary fallback while every instance was unhealthy.
    pub via_fallback: bool,
}

pub struct AssembledStream {
    pub tokens: TokenStream,
    pub citations: Vec<Citation>,
    pub instance_id: Option<String>,
    pub insufficient_knowledge: bool,
    pub via_fallback: bool,
}

impl std::fmt::Debug for AssembledStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssembledStream")
            .field("citations", &self.citations.len())
            .field("instance_id", &self.instance_id)
            .field("insufficient_knowledge", &self.insufficient_knowledge)
            .field("via_fallback", &self.via_fallback)
            .finish()
    }
}
