//! HTTP gateway (Axum) exposing the answer operation.
//!
//! This module is primarily used by the `sluice` server binary.

#![allow(missing_docs)]

pub mod error;
pub mod handler;
pub mod state;
pub mod streaming;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{AnswerRequest, answer_handler};
pub use state::HandlerState;
pub use streaming::{DONE_SENTINEL, StreamMetadata, stream_response};

use crate::registry::{Instance, RegistryHealth};

/// Carries the cache tier and route of an answer, or the probe status on health endpoints.
pub const SLUICE_STATUS_HEADER: &str = "X-Sluice-Status";

pub const SLUICE_STATUS_HEALTHY: &str = "healthy";
pub const SLUICE_STATUS_READY: &str = "ready";
pub const SLUICE_STATUS_NOT_READY: &str = "not_ready";

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/instances", get(instances_handler))
        .route("/v1/answer", post(answer_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub registry: RegistryHealth,
    pub web_search: &'static str,
    pub cached_answers: usize,
}

#[derive(serde::Serialize)]
pub struct InstancesResponse {
    pub health: RegistryHealth,
    pub primary: Option<String>,
    pub instances: Vec<Instance>,
}

fn status_headers(status: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(SLUICE_STATUS_HEADER, HeaderValue::from_static(status));
    headers
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (
        StatusCode::OK,
        status_headers(SLUICE_STATUS_HEALTHY),
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready unless every instance is unhealthy. A degraded registry still serves.
#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let registry = state.engine.registry().health();
    let web_search = if state.engine.web().is_available() {
        "available"
    } else {
        "disabled"
    };

    let components = ComponentStatus {
        http: SLUICE_STATUS_READY,
        registry,
        web_search,
        cached_answers: state.engine.cache().semantic().len(),
    };

    let is_ready = !matches!(registry, RegistryHealth::AllUnhealthy { .. });
    let (status_code, status_msg) = if is_ready {
        (StatusCode::OK, SLUICE_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, SLUICE_STATUS_NOT_READY)
    };

    (
        status_code,
        status_headers(status_msg),
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn instances_handler(State(state): State<HandlerState>) -> Response {
    let registry = state.engine.registry();
    let body = InstancesResponse {
        health: registry.health(),
        primary: registry.primary().map(str::to_string),
        instances: registry.snapshot(),
    };
    (StatusCode::OK, Json(body)).into_response()
}
