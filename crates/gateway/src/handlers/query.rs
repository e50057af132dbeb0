//! Question-answering handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use ragforge_common::{
    config::PipelineMode,
    errors::{AppError, Result},
    metrics::RequestMetrics,
};

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub question: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContextQueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub question: String,

    /// JSON-encoded array of `{role, content}` objects
    #[serde(default)]
    pub conversation_history: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,

    /// Pipeline that produced the answer; null when unconfigured
    pub mode: Option<PipelineMode>,
}

/// Answer a standalone question
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let metrics = RequestMetrics::start("POST", "/v1/query");

    let result = answer(&state, &request.question, None, &request).await;
    metrics.finish(status_of(&result));

    result.map(Json)
}

/// Answer a question within a conversation
pub async fn query_with_context(
    State(state): State<AppState>,
    Json(request): Json<ContextQueryRequest>,
) -> Result<Json<QueryResponse>> {
    let metrics = RequestMetrics::start("POST", "/v1/query/context");

    let result = answer(
        &state,
        &request.question,
        Some(request.conversation_history.as_str()),
        &request,
    )
    .await;
    metrics.finish(status_of(&result));

    result.map(Json)
}

async fn answer(
    state: &AppState,
    question: &str,
    history_json: Option<&str>,
    request: &impl Validate,
) -> Result<QueryResponse> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    let answer = match history_json {
        Some(history) => state.rag.query_with_context(question, history).await?,
        None => state.rag.query(question).await?,
    };

    Ok(QueryResponse {
        answer,
        mode: state.rag.mode(),
    })
}

fn status_of(result: &Result<QueryResponse>) -> u16 {
    match result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    }
}
