use axum::{
    extract::State,
    routing::{delete, post},
    Json, Router,
};
use tracing::info;
use validator::Validate;

use crate::models::{AppState, CacheClearedResponse, ResearchRequest, ResearchResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/research", post(post_research))
        .route("/api/research/cache", delete(clear_cache))
        .with_state(state)
}

pub async fn post_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> AppResult<Json<ResearchResponse>> {
    request.validate()?;
    info!(query = %request.query, "Received research request");

    let report = state.orchestrator.execute_research_workflow(&request.query).await;

    Ok(Json(ResearchResponse {
        query: request.query,
        report: (*report).clone(),
    }))
}

async fn clear_cache(State(state): State<AppState>) -> Json<CacheClearedResponse> {
    let cleared = state.orchestrator.clear_workflow_cache().await;
    Json(CacheClearedResponse { cleared })
}
