use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::SLUICE_STATUS_HEADER;
use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    InvalidOptions(#[from] EngineError),

    #[error("serialization failed: {0}")]
    SerializationFailed(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, sluice_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::InvalidOptions(_) => (StatusCode::BAD_REQUEST, "invalid_options"),
            GatewayError::SerializationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(SLUICE_STATUS_HEADER, HeaderValue::from_static(sluice_status));

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
