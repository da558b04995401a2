// Thesys - research assistant agents over an in-process message bus

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod communication;
pub mod orchestrator;
pub mod llm;
pub mod search;    // CrossRef, Semantic Scholar, arXiv and NewsAPI clients
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
// Note: Import specific items from types module instead of glob to avoid name conflicts
// e.g., use thesys::types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
