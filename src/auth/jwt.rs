use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{AccessClaims, RefreshClaims};
use super::repo_types::User;
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Signing and verification keys. Access and refresh tokens use distinct
/// secrets, so one kind can never pass verification as the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            access_secret,
            refresh_secret,
            access_ttl_minutes,
            refresh_ttl_days,
        } = state.config.jwt.clone();
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_days as u64) * 24 * 60 * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign_access(&self, user: &User) -> Result<String, ApiError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.access_ttl.as_secs() as i64);
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, ApiError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.refresh_ttl.as_secs() as i64);
        let claims = RefreshClaims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))?;
        debug!(user_id = %user_id, "refresh token signed");
        Ok(token)
    }

    /// Stateless check: signature and expiry only.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    /// Stateless check of the refresh signature. Callers must combine this
    /// with the store-side revocation check before trusting the session.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map_err(map_jwt_error)?;
        Ok(data.claims)
    }

    /// Absolute expiry timestamp a refresh token signed now would carry.
    pub fn refresh_expiry(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + TimeDuration::seconds(self.refresh_ttl.as_secs() as i64)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> ApiError {
    match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::TokenExpired,
        _ => ApiError::TokenInvalid,
    }
}
