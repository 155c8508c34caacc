use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, field, instrument};

use super::SLUICE_STATUS_HEADER;
use crate::cache::SLUICE_CACHE_HEADER;
use crate::engine::{Answer, AnswerOptions};
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::gateway::streaming::stream_response;

/// Body of `POST /v1/answer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerRequest {
    pub query: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: AnswerOptions,
}

#[instrument(skip(state, request), fields(stream = field::Empty))]
pub async fn answer_handler(
    State(state): State<HandlerState>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    let request: AnswerRequest = serde_json::from_value(request)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {}", e)))?;
    tracing::Span::current().record("stream", request.stream);

    if request.query.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "query must not be empty".to_string(),
        ));
    }
    request.options.validate()?;

    if request.stream {
        debug!("Streaming request received - bypassing answer cache");
        let answer = state
            .engine
            .answer_stream(&request.query, &request.options)
            .await;
        return Ok(stream_response(answer));
    }

    let answer = state.engine.answer(&request.query, &request.options).await;
    make_response(&answer)
}

pub(crate) fn make_response(answer: &Answer) -> Result<Response, GatewayError> {
    let body = serde_json::to_value(answer)
        .map_err(|e| GatewayError::SerializationFailed(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SLUICE_STATUS_HEADER,
        HeaderValue::from_str(&answer.status_header())
            .unwrap_or(HeaderValue::from_static("error")),
    );
    headers.insert(
        SLUICE_CACHE_HEADER,
        HeaderValue::from_static(answer.cache.status.as_header_value()),
    );
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}
