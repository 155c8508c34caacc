use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One retrievable chunk of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub source_document: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Precomputed embedding. Missing vectors are filled in at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Passage {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source_document: String::new(),
            updated_at: None,
            embedding: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_document = source.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A single search result from either side of the store.
///
/// `score` is the raw side-specific score (cosine for vector, BM25 for lexical);
/// normalization happens during fusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreHit {
    pub passage_id: String,
    pub content: String,
    pub source_document: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub score: f32,
}

impl StoreHit {
    pub(crate) fn from_passage(passage: &Passage, score: f32) -> Self {
        Self {
            passage_id: passage.id.clone(),
            content: passage.content.clone(),
            source_document: passage.source_document.clone(),
            updated_at: passage.updated_at,
            score,
        }
    }
}
