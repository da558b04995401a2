use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        agents: state
            .protocol
            .agent_ids()
            .iter()
            .map(|id| id.to_string())
            .collect(),
        cached_workflows: state.orchestrator.cached_workflows().await,
        llm_summaries: state.agents.scholar.has_llm(),
    };

    Json(response)
}
