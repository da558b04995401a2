use std::time::Instant;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;
use validator::Validate;

use crate::agents::DEFAULT_CHAT_ID;
use crate::communication::run_advanced_messaging_workflow;
use crate::models::{AppState, ChatRequest, ChatResponse, ContextResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .route("/api/chat/{chat_id}/context", get(get_context))
        .with_state(state)
}

pub async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    request.validate()?;
    let started = Instant::now();
    let chat_id = request
        .chat_id
        .unwrap_or_else(|| DEFAULT_CHAT_ID.to_string());
    info!(chat_id = %chat_id, message_len = request.message.len(), "Received chat request");

    let result = run_advanced_messaging_workflow(
        &state.protocol,
        &request.message,
        Some(&chat_id),
        state.config.bus.response_timeout(),
    )
    .await?;

    let response = ChatResponse {
        chat_id,
        result,
        response_time_ms: started.elapsed().as_millis() as u64,
    };
    info!(chat_id = %response.chat_id, response_time_ms = response.response_time_ms, "Chat response sent");

    Ok(Json(response))
}

async fn get_context(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Json<ContextResponse> {
    let context = state.agents.context.retrieve_context(&chat_id);
    Json(ContextResponse { chat_id, context })
}
