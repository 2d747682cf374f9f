use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod service;

pub fn router(upload_limiter: RateLimiter) -> Router<AppState> {
    handlers::routes(upload_limiter)
}
