use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::stream;
use tracing::{debug, instrument};

use super::config::AnswerConfig;
use super::error::AnswerResult;
use super::types::{AssembledAnswer, AssembledContext, AssembledStream, Citation, CitationKind};
use crate::backend::{BackendError, GenerateParams};
use crate::dispatch::Dispatcher;
use crate::retrieval::CandidatePassage;
use crate::routing::Route;
use crate::text::truncate_chars;
use crate::web::WebResult;

const INSTRUCTIONS: &str = "You are a technical assistant. Answer the question using only the \
numbered sources below and cite them inline as [n]. If the sources do not contain the answer, \
say so plainly.";

const LOW_CONFIDENCE_NOTE: &str = "Note: the available sources may not fully cover this \
question. State clearly which parts of the answer are uncertain.";

/// Reply used when no source reached the context.
pub fn insufficient_knowledge_reply(query: &str) -> String {
    format!(
        "I don't have enough information in the knowledge base to answer \"{}\". \
         No relevant sources were found.",
        query.trim()
    )
}

/// Builds generation context from routed sources and runs generation.
pub struct AnswerAssembler {
    dispatcher: Arc<Dispatcher>,
    config: AnswerConfig,
}

impl AnswerAssembler {
    pub fn new(dispatcher: Arc<Dispatcher>, config: AnswerConfig) -> AnswerResult<Self> {
        config.validate()?;
        Ok(Self { dispatcher, config })
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Numbers KB passages first, then web results, within the configured limits.
    ///
    /// Every citation corresponds to a block present in `text`. A block that would
    /// overflow the budget is shortened (and keeps its citation) if at least
    /// `min_block_chars` remain; otherwise it and everything after it are dropped.
    pub fn build_context(
        &self,
        route: Route,
        passages: &[CandidatePassage],
        web: &[WebResult],
    ) -> AssembledContext {
        let mut sources: Vec<(CitationKind, &str, &str, &str)> = Vec::new();
        if route.uses_kb() {
            sources.extend(passages.iter().take(self.config.max_kb_sources).map(|p| {
                let title = if p.source_document.is_empty() {
                    p.id.as_str()
                } else {
                    p.source_document.as_str()
                };
                (CitationKind::Kb, p.id.as_str(), title, p.content.as_str())
            }));
        }
        if route.uses_web() {
            sources.extend(
                web.iter()
                    .take(self.config.max_web_sources)
                    .map(|w| (CitationKind::Web, w.url.as_str(), w.title.as_str(), w.snippet.as_str())),
            );
        }

        let mut ctx = AssembledContext::default();
        let mut remaining = self.config.max_context_chars;
        let total = sources.len();
        for (kind, reference, title, body) in sources {
            let body_chars = body.chars().count();
            let included = if body_chars <= remaining {
                body
            } else if remaining >= self.config.min_block_chars {
                ctx.truncated = true;
                truncate_chars(body, remaining)
            } else {
                ctx.truncated = true;
                break;
            };
            remaining -= included.chars().count();

            let index = ctx.citations.len() + 1;
            let _ = writeln!(ctx.text, "[{index}] ({}) {title}\n{included}\n", kind.as_str());
            ctx.citations.push(Citation {
                index,
                kind,
                reference: reference.to_string(),
                title: title.to_string(),
                snippet: truncate_chars(included, self.config.snippet_chars).to_string(),
            });
        }

        debug!(
            sources = total,
            included = ctx.citations.len(),
            truncated = ctx.truncated,
            "context assembled"
        );
        ctx
    }

    pub fn build_prompt(&self, query: &str, context: &AssembledContext, low_confidence: bool) -> String {
        let mut prompt = String::with_capacity(context.text.len() + query.len() + 512);
        prompt.push_str(INSTRUCTIONS);
        prompt.push('\n');
        if low_confidence {
            prompt.push_str(LOW_CONFIDENCE_NOTE);
            prompt.push('\n');
        }
        prompt.push_str("\nSources:\n");
        prompt.push_str(&context.text);
        let _ = write!(prompt, "Question: {}\nAnswer:", query.trim());
        prompt
    }

    /// Generates an answer from `context`, or the insufficient-knowledge reply when the
    /// context is empty.
    #[instrument(skip_all, fields(request_id = %request_id, sources = context.citations.len()))]
    pub async fn generate(
        &self,
        request_id: &str,
        query: &str,
        context: AssembledContext,
        low_confidence: bool,
        params: &GenerateParams,
    ) -> AnswerResult<AssembledAnswer> {
        if context.is_empty() {
            return Ok(AssembledAnswer {
                text: insufficient_knowledge_reply(query),
                citations: Vec::new(),
                instance_id: None,
                insufficient_knowledge: true,
                via_fallback: false,
            });
        }
        let prompt = self.build_prompt(query, &context, low_confidence);
        let result = self.dispatcher.generate(request_id, &prompt, params).await?;
        Ok(AssembledAnswer {
            text: result.output,
            citations: context.citations,
            instance_id: Some(result.instance_id),
            insufficient_knowledge: false,
            via_fallback: result.via_fallback,
        })
    }

    #[instrument(skip_all, fields(request_id = %request_id, sources = context.citations.len()))]
    pub async fn generate_stream(
        &self,
        request_id: &str,
        query: &str,
        context: AssembledContext,
        low_confidence: bool,
        params: &GenerateParams,
    ) -> AnswerResult<AssembledStream> {
        if context.is_empty() {
            let reply = insufficient_knowledge_reply(query);
            return Ok(AssembledStream {
                tokens: Box::pin(stream::once(async move { Ok::<_, BackendError>(reply) })),
                citations: Vec::new(),
                instance_id: None,
                insufficient_knowledge: true,
                via_fallback: false,
            });
        }
        let prompt = self.build_prompt(query, &context, low_confidence);
        let result = self
            .dispatcher
            .generate_stream(request_id, &prompt, params)
            .await?;
        Ok(AssembledStream {
            tokens: result.output,
            citations: context.citations,
            instance_id: Some(result.instance_id),
            insufficient_knowledge: false,
            via_fallback: result.via_fallback,
        })
    }
}

impl std::fmt::Debug for AnswerAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerAssembler")
            .field("config", &self.config)
            .finish()
    }
}
