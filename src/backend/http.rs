//! Ollama-compatible HTTP backend.
//!
//! Endpoints used: `GET /api/tags` (liveness), `POST /api/embeddings`,
//! `POST /api/generate` (single JSON object or NDJSON when streaming).

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::ModelBackend;
use super::error::{BackendError, BackendResult};
use super::types::{CallContext, GenerateParams, TokenStream};

/// HTTP client for a single model-serving instance.
#[derive(Debug, Clone)]
pub struct HttpModelBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Splits a byte stream into NDJSON lines. Bytes are only decoded once a line is
/// complete, so multi-byte characters may straddle chunk boundaries.
#[derive(Debug, Default)]
pub(super) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends `chunk` and returns every line it completed, blank lines dropped.
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(line) = non_blank(&line) {
                lines.push(line.to_vec());
            }
        }
        lines
    }

    /// Takes whatever is left after the byte stream ended.
    pub(super) fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.pending);
        non_blank(&rest).map(<[u8]>::to_vec)
    }
}

fn non_blank(line: &[u8]) -> Option<&[u8]> {
    let trimmed = line.trim_ascii();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Sends one decoded frame to the consumer. Returns `false` once the stream is over.
async fn forward_frame(
    tx: &mpsc::Sender<BackendResult<String>>,
    instance: &str,
    line: &[u8],
) -> bool {
    match serde_json::from_slice::<GenerateResponse>(line) {
        Ok(frame) => {
            if !frame.response.is_empty() && tx.send(Ok(frame.response)).await.is_err() {
                return false;
            }
            if frame.done {
                debug!(instance = %instance, "generation stream finished");
                return false;
            }
            true
        }
        Err(e) => {
            warn!(instance = %instance, error = %e, "skipping unparsable stream frame");
            true
        }
    }
}

impl HttpModelBackend {
    pub fn new(
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        generate_model: impl Into<String>,
    ) -> Self {
        Self::with_client(Client::new(), base_url, embed_model, generate_model)
    }

    /// Shares a connection pool across instances.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        embed_model: impl Into<String>,
        generate_model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embed_model: embed_model.into(),
            generate_model: generate_model.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_context(builder: RequestBuilder, ctx: &CallContext) -> RequestBuilder {
        ctx.headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()))
    }

    async fn check_status(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn generate_body(&self, prompt: &str, params: &GenerateParams, stream: bool) -> serde_json::Value {
        json!({
            "model": self.generate_model,
            "prompt": prompt,
            "stream": stream,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        })
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn healthcheck(&self, ctx: &CallContext) -> BackendResult<()> {
        let request = Self::apply_context(self.client.get(self.url("/api/tags")), ctx);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    async fn embed(&self, ctx: &CallContext, text: &str) -> BackendResult<Vec<f32>> {
        let body = json!({ "model": self.embed_model, "prompt": text });
        let request = Self::apply_context(self.client.post(self.url("/api/embeddings")), ctx);
        let response = Self::check_status(request.json(&body).send().await?).await?;
        let parsed: EmbeddingResponse = response.json().await?;
        Ok(parsed.embedding)
    }

    async fn generate(
        &self,
        ctx: &CallContext,
        prompt: &str,
        params: &GenerateParams,
    ) -> BackendResult<String> {
        let body = self.generate_body(prompt, params, false);
        let request = Self::apply_context(self.client.post(self.url("/api/generate")), ctx);
        let response = Self::check_status(request.json(&body).send().await?).await?;
        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response)
    }

    async fn generate_stream(
        &self,
        ctx: &CallContext,
        prompt: &str,
        params: &GenerateParams,
    ) -> BackendResult<TokenStream> {
        let body = self.generate_body(prompt, params, true);
        let request = Self::apply_context(self.client.post(self.url("/api/generate")), ctx);
        let response = Self::check_status(request.json(&body).send().await?).await?;

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = response.bytes_stream();
        let instance = self.base_url.clone();

        tokio::spawn(async move {
            let mut lines = LineBuffer::default();
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(BackendError::Stream {
                                reason: e.to_string(),
                            }))
                            .await;
                        return;
                    }
                };
                for line in lines.push(&chunk) {
                    if !forward_frame(&tx, &instance, &line).await {
                        return;
                    }
                }
            }
            // Servers may close without a newline after the last frame.
            if let Some(line) = lines.finish() {
                forward_frame(&tx, &instance, &line).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
