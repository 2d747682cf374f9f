use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod service;

pub use extractors::AuthUser;

pub fn router(login_limiter: RateLimiter) -> Router<AppState> {
    handlers::routes(login_limiter)
}
