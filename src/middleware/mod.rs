// Middleware for CORS and inbound rate limiting

pub mod cors;
pub mod rate_limiter;

pub use cors::*;
pub use rate_limiter::*;
