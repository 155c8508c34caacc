use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("invalid passage on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("invalid passage {id}: {reason}")]
    InvalidPassage { id: String, reason: String },

    #[error("duplicate passage id: {id}")]
    DuplicatePassage { id: String },

    #[error("failed to embed passage {id}: {reason}")]
    Embedding { id: String, reason: String },

    #[error("{side} search failed: {reason}")]
    Search { side: &'static str, reason: String },
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
