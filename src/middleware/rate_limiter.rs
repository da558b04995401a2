// Global inbound rate limiting with governor

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::warn;

pub type InboundLimiter = Arc<DefaultDirectRateLimiter>;

pub async fn rate_limiter_middleware(
    State(limiter): State<InboundLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        warn!(path = %req.uri().path(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "Rate limit exceeded" })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Limit the whole router to `per_second` requests; 0 leaves it unlimited
pub fn apply_rate_limit(router: Router, per_second: u32) -> Router {
    match NonZeroU32::new(per_second) {
        Some(rate) => {
            let limiter: InboundLimiter = Arc::new(RateLimiter::direct(Quota::per_second(rate)));
            router.layer(axum::middleware::from_fn_with_state(limiter, rate_limiter_middleware))
        }
        None => router,
    }
}
