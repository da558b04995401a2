//! API Routes
//!
//! - `GET /api/health` - liveness plus registered agents
//! - `POST /api/research` - orchestrated research report (cached)
//! - `DELETE /api/research/cache` - drop cached reports
//! - `POST /api/chat` - Scholar -> FactCheck -> Citation -> Context over the bus
//! - `GET /api/chat/{chat_id}/context` - stored chat history
//! - `POST /api/citations` - format citations for a DOI or free text

pub mod chat;
pub mod citations;
pub mod health;
pub mod research;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::{apply_cors, apply_rate_limit};
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");
    let server = state.config.server.clone();

    let router = Router::new()
        .merge(health::router(state.clone()))
        .merge(research::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(citations::router(state));

    let router = apply_rate_limit(router, server.requests_per_second);
    let router = apply_cors(router, &server.cors_allowed_origins);
    router.layer(TraceLayer::new_for_http())
}
