//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;
use ragforge_common::config::PipelineMode;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub retrieval: CheckResult,
    pub pipeline: Option<PipelineMode>,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: ragforge_common::VERSION.to_string(),
    })
}

/// Readiness check - ready once a retrieval deployment is configured
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let mode = state.rag.mode();

    let retrieval = match mode {
        Some(_) => CheckResult {
            status: "up".to_string(),
            error: None,
        },
        None => CheckResult {
            status: "down".to_string(),
            error: Some(format!(
                "{} is not configured.",
                ragforge_common::config::RAG_DEPLOYMENT_ID_KEY
            )),
        },
    };

    let (status, label) = if mode.is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(ReadyResponse {
            status: label.to_string(),
            checks: HealthChecks {
                retrieval,
                pipeline: mode,
            },
        }),
    )
}
