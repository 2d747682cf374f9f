use axum::{
    extract::{ConnectInfo, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::net::SocketAddr;
use tracing::instrument;

use super::dto::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, VerifyResponse};
use super::extractors::AuthUser;
use super::service::{self, SessionTokens};
use crate::error::ApiError;
use crate::rate_limit::{rate_limit_layer, RateLimiter};
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

pub fn routes(login_limiter: RateLimiter) -> Router<AppState> {
    let limited = Router::new()
        .route("/auth/login", post(login))
        .route_layer(middleware::from_fn(rate_limit_layer(login_limiter)));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/verify", get(verify))
        .merge(limited)
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let source = addr.ip().to_string();
    let tokens =
        service::register(&state, &payload.email, &payload.password, Some(&source)).await?;
    Ok(session_response(&state, jar, tokens))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let source = addr.ip().to_string();
    let tokens = service::login(&state, &payload.email, &payload.password, Some(&source)).await?;
    Ok(session_response(&state, jar, tokens))
}

#[instrument(skip(state, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::MissingToken)?;
    let tokens = service::refresh(&state, &token).await?;
    Ok(session_response(&state, jar, tokens))
}

#[instrument(skip(state, jar, user))]
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user: AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    let source = addr.ip().to_string();
    service::logout(&state, user.id, Some(&source)).await?;
    Ok((
        jar.remove(removal_cookie()),
        Json(MessageResponse {
            message: "Logged out successfully".into(),
        }),
    ))
}

pub async fn verify(_user: AuthUser) -> Json<VerifyResponse> {
    Json(VerifyResponse { valid: true })
}

fn session_response(
    state: &AppState,
    jar: CookieJar,
    tokens: SessionTokens,
) -> (CookieJar, Json<AuthResponse>) {
    let cookie = refresh_cookie(
        tokens.refresh_token,
        time::Duration::days(state.config.jwt.refresh_ttl_days),
        state.config.production,
    );
    (
        jar.add(cookie),
        Json(AuthResponse {
            user: tokens.user,
            token: tokens.access_token,
        }),
    )
}

/// Refresh cookie: HTTP-only, strict same-site, scoped to the auth routes.
/// `secure` only in production so local development over plain HTTP works.
fn refresh_cookie(token: String, max_age: time::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .path(REFRESH_COOKIE_PATH)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_scoped_and_script_unreadable() {
        let cookie = refresh_cookie("tok".into(), time::Duration::days(7), false);
        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/api/auth"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn refresh_cookie_is_secure_in_production() {
        let cookie = refresh_cookie("tok".into(), time::Duration::days(7), true);
        assert_eq!(cookie.secure(), Some(true));
    }
}
