use axum::{extract::State, routing::post, Json, Router};
use tracing::info;
use validator::Validate;

use crate::models::{AppState, CitationRequest, CitationResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/citations", post(post_citations))
        .with_state(state)
}

pub async fn post_citations(
    State(state): State<AppState>,
    Json(request): Json<CitationRequest>,
) -> AppResult<Json<CitationResponse>> {
    request.validate()?;
    let style = request.style.unwrap_or_default();
    info!(style = %style, "Received citation request");

    let citations = state.agents.citation.cite(&request.text, style).await?;

    Ok(Json(CitationResponse {
        citations,
        style: style.as_str(),
    }))
}
