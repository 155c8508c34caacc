use super::error::{AnswerError, AnswerResult};

pub const DEFAULT_MAX_KB_SOURCES: usize = 5;
pub const DEFAULT_MAX_WEB_SOURCES: usize = 5;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6_000;
/// A block is dropped rather than truncated below this many characters.
pub const DEFAULT_MIN_BLOCK_CHARS: usize = 40;
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub max_kb_sources: usize,
    pub max_web_sources: usize,
    /// Budget for source text in the prompt, in characters.
    pub max_context_chars: usize,
    pub min_block_chars: usize,
    pub snippet_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_kb_sources: DEFAULT_MAX_KB_SOURCES,
            max_web_sources: DEFAULT_MAX_WEB_SOURCES,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            min_block_chars: DEFAULT_MIN_BLOCK_CHARS,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

impl AnswerConfig {
    pub fn max_kb_sources(mut self, n: usize) -> Self {
        self.max_kb_sources = n;
        self
    }

    pub fn max_web_sources(mut self, n: usize) -> Self {
        self.max_web_sources = n;
        self
    }

    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = chars;
        self
    }

    pub fn min_block_chars(mut self, chars: usize) -> Self {
        self.min_block_chars = chars;
        self
    }

    pub fn validate(&self) -> AnswerResult<()> {
        if self.max_context_chars == 0 {
            return Err(AnswerError::InvalidConfig {
                reason: "max_context_chars must be non-zero".to_string(),
            });
        }
        if self.min_block_chars > self.max_context_chars {
            return Err(AnswerError::InvalidConfig {
                reason: "min_block_chars cannot exceed max_context_chars".to_string(),
            });
        }
        Ok(())
    }
}
