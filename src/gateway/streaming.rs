//! Server-sent events rendering of an [`AnswerStream`].
//!
//! Event order: one `metadata` event carrying everything known before generation,
//! `token` events as text arrives, then `done`. A mid-stream backend error becomes a
//! single `error` event; no tokens follow it.

use axum::{
    http::HeaderValue,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{error, warn};

use super::SLUICE_STATUS_HEADER;
use crate::answer::Citation;
use crate::confidence::ConfidenceScore;
use crate::engine::{AnswerMethod, AnswerStream, CacheProvenance, Degradation};
use crate::rerank::RerankStatus;
use crate::retrieval::FusionMode;
use crate::routing::RouteDecision;

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Serialize)]
pub struct StreamMetadata<'a> {
    pub request_id: &'a str,
    pub query: &'a str,
    pub method: &'a AnswerMethod,
    pub route: &'a RouteDecision,
    pub confidence: &'a ConfidenceScore,
    pub low_confidence: bool,
    pub citations: &'a [Citation],
    pub cache: &'a CacheProvenance,
    pub retrieval_mode: &'a FusionMode,
    pub rerank: &'a RerankStatus,
    pub degradations: &'a [Degradation],
    pub error: Option<&'a Degradation>,
    pub registry_degraded: bool,
    pub instance_id: Option<&'a str>,
}

impl<'a> From<&'a AnswerStream> for StreamMetadata<'a> {
    fn from(s: &'a AnswerStream) -> Self {
        Self {
            request_id: &s.request_id,
            query: &s.query,
            method: &s.method,
            route: &s.route,
            confidence: &s.confidence,
            low_confidence: s.low_confidence,
            citations: &s.citations,
            cache: &s.cache,
            retrieval_mode: &s.retrieval_mode,
            rerank: &s.rerank,
            degradations: &s.degradations,
            error: s.error.as_ref(),
            registry_degraded: s.registry_degraded,
            instance_id: s.instance_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct TokenChunk<'a> {
    text: &'a str,
}

fn metadata_event(answer: &AnswerStream) -> Event {
    match serde_json::to_string(&StreamMetadata::from(answer)) {
        Ok(json) => Event::default().event("metadata").data(json),
        Err(e) => {
            error!("Failed to serialize stream metadata: {}", e);
            Event::default().comment("metadata-error")
        }
    }
}

fn token_event(text: &str) -> Event {
    match serde_json::to_string(&TokenChunk { text }) {
        Ok(json) => Event::default().event("token").data(json),
        Err(e) => {
            error!("Failed to serialize token: {}", e);
            Event::default().comment("serialization-error")
        }
    }
}

/// Renders `answer` as an SSE response with the `X-Sluice-Status` header set.
pub fn stream_response(answer: AnswerStream) -> Response {
    let status = answer.status_header();
    let metadata = metadata_event(&answer);
    let request_id = answer.request_id.clone();

    let tokens = answer
        .tokens
        .scan(false, move |failed, item| {
            if *failed {
                return std::future::ready(None);
            }
            let event = match item {
                Ok(text) => token_event(&text),
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Token stream interrupted");
                    *failed = true;
                    Event::default()
                        .event("error")
                        .data("Stream interrupted by upstream error")
                }
            };
            std::future::ready(Some(event))
        });

    let events = stream::once(std::future::ready(metadata))
        .chain(tokens)
        .chain(stream::once(std::future::ready(
            Event::default().event("done").data(DONE_SENTINEL),
        )))
        .map(Ok::<_, Infallible>);

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&status) {
        response.headers_mut().insert(SLUICE_STATUS_HEADER, value);
    }
    response
}
