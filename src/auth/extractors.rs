use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use super::repo_types::UserRole;
use crate::error::ApiError;

/// Extracts and validates the bearer access token. Stateless: signature and
/// expiry only, no store lookup.
#[derive(Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::TokenInvalid)?;

        let claims = keys.verify_access(token).map_err(|e| {
            warn!("invalid or expired access token");
            e
        })?;

        Ok(AuthUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{User, UserStatus};
    use crate::state::AppState;
    use axum::http::Request;
    use time::OffsetDateTime;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/verify");
        if let Some(v) = value {
            builder = builder.header("authorization", v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_claims_from_bearer_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            password_hash: String::new(),
            role: UserRole::Admin,
            status: UserStatus::Active,
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        };
        let token = keys.sign_access(&user).unwrap();

        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));
        let auth = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(auth.id, user.id);
        assert_eq!(auth.email, "a@example.com");
        assert_eq!(auth.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_header(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(Uuid::new_v4()).unwrap();
        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TokenInvalid));
    }
}
