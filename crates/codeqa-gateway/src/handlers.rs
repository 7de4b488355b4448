use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use codeqa_rag::RequestScope;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Deserialize)]
pub(crate) struct QueryRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
pub(crate) struct QueryResponse {
    response: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // Dropping the handler (client disconnect) cancels in-flight calls.
    let scope = RequestScope::with_timeout(state.request_timeout);
    let _guard = scope.drop_guard();

    let started = Instant::now();
    let response = state.assistant.answer(&scope, &request.query).await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis(),
        "query answered"
    );
    Ok(Json(QueryResponse { response }))
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
