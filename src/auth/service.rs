use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::PublicUser;
use super::jwt::JwtKeys;
use super::password::{check_password_policy, hash_password, verify_password};
use super::repo::{audit, LoginAttempts, RefreshTokens};
use super::repo_types::{AuditAction, User, UserRole, UserStatus};
use crate::error::{is_unique_violation, ApiError};
use crate::state::AppState;

/// Window consulted when reporting repeated failed logins.
const ATTEMPT_WINDOW_MINUTES: i32 = 15;
const ATTEMPT_WARN_THRESHOLD: i64 = 5;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Result of a successful lifecycle transition. The refresh token is handed
/// to the HTTP layer for cookie delivery only.
pub struct SessionTokens {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Register: reject taken emails, hash, create, then issue a session the
/// same way login does.
pub async fn register(
    st: &AppState,
    email: &str,
    password: &str,
    source_addr: Option<&str>,
) -> Result<SessionTokens, ApiError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    check_password_policy(password)?;

    if User::find_by_email(&st.db, &email).await?.is_some() {
        warn!(email = %email, "registration with taken email");
        return Err(ApiError::EmailTaken);
    }

    let hash = hash_password(password)?;
    let user = match User::create(&st.db, &email, &hash, UserRole::User, source_addr).await {
        Ok(u) => u,
        // Lost the race against a concurrent registration for the same email.
        Err(e) if is_unique_violation(&e) => return Err(ApiError::EmailTaken),
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_session(st, &user).await
}

/// Login: uniform `InvalidCredentials` whether the email is unknown, the
/// password is wrong, or the account is disabled. Every attempt is recorded.
pub async fn login(
    st: &AppState,
    email: &str,
    password: &str,
    source_addr: Option<&str>,
) -> Result<SessionTokens, ApiError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match User::find_by_email(&st.db, &email).await? {
        Some(u) => u,
        None => {
            record_failure(st, &email, source_addr).await?;
            return Err(ApiError::InvalidCredentials);
        }
    };

    let ok = verify_password(password, &user.password_hash)?;
    if !ok || user.status == UserStatus::Disabled {
        record_failure(st, &email, source_addr).await?;
        return Err(ApiError::InvalidCredentials);
    }

    LoginAttempts::record(&st.db, &email, source_addr, true).await?;
    User::record_login(&st.db, user.id, source_addr).await?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue_session(st, &user).await
}

/// Refresh: the signature check alone is not enough — the exact token must
/// still be live in the store. A token rotated out by a newer login or
/// refresh fails here with `SessionRevoked`, which is the replay defense.
pub async fn refresh(st: &AppState, refresh_token: &str) -> Result<SessionTokens, ApiError> {
    let keys = JwtKeys::from_ref(st);
    let claims = keys.verify_refresh(refresh_token)?;

    if !RefreshTokens::is_valid(&st.db, claims.sub, refresh_token).await? {
        warn!(user_id = %claims.sub, "refresh with rotated-out or revoked token");
        return Err(ApiError::SessionRevoked);
    }

    let user = User::find_by_id(&st.db, claims.sub)
        .await?
        .ok_or(ApiError::TokenInvalid)?;
    if user.status == UserStatus::Disabled {
        return Err(ApiError::SessionRevoked);
    }

    let access_token = keys.sign_access(&user)?;
    let new_refresh = keys.sign_refresh(user.id)?;
    let rotated = RefreshTokens::replace(
        &st.db,
        user.id,
        refresh_token,
        &new_refresh,
        keys.refresh_expiry(),
    )
    .await?;
    if rotated == 0 {
        // A concurrent refresh or login rotated the token between the
        // validity check and the update.
        return Err(ApiError::SessionRevoked);
    }

    audit(
        &st.db,
        Some(user.id),
        AuditAction::TokenRefreshed,
        serde_json::json!({}),
        None,
    )
    .await?;

    Ok(SessionTokens {
        user: public(&user),
        access_token,
        refresh_token: new_refresh,
    })
}

/// Logout: revoke every live session for the subject. Succeeds even when no
/// session existed server-side.
pub async fn logout(
    st: &AppState,
    user_id: Uuid,
    source_addr: Option<&str>,
) -> Result<(), ApiError> {
    let revoked = RefreshTokens::revoke_all(&st.db, user_id).await?;
    audit(
        &st.db,
        Some(user_id),
        AuditAction::UserLogout,
        serde_json::json!({ "revoked_sessions": revoked }),
        source_addr,
    )
    .await?;
    info!(user_id = %user_id, revoked, "user logged out");
    Ok(())
}

/// Create the default admin account when seed credentials are configured
/// and the account does not exist yet.
pub async fn ensure_admin(st: &AppState) -> anyhow::Result<()> {
    let Some(seed) = &st.config.admin else {
        return Ok(());
    };
    let email = normalize_email(&seed.email);
    if User::find_by_email(&st.db, &email).await?.is_some() {
        return Ok(());
    }

    let hash = hash_password(&seed.password).map_err(anyhow::Error::new)?;
    match User::create(&st.db, &email, &hash, UserRole::Admin, None).await {
        Ok(user) => info!(user_id = %user.id, email = %email, "default admin user created"),
        Err(e) if is_unique_violation(&e) => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn record_failure(
    st: &AppState,
    email: &str,
    source_addr: Option<&str>,
) -> Result<(), ApiError> {
    LoginAttempts::record(&st.db, email, source_addr, false).await?;
    let recent = LoginAttempts::recent_count(&st.db, email, ATTEMPT_WINDOW_MINUTES).await?;
    if recent >= ATTEMPT_WARN_THRESHOLD {
        warn!(email = %email, attempts = recent, "repeated failed logins in window");
    } else {
        warn!(email = %email, "failed login");
    }
    Ok(())
}

/// Token issuance tail shared by register and login. Minting happens before
/// persistence; a store failure means the pair is never returned, so no
/// orphaned session can exist.
async fn issue_session(st: &AppState, user: &User) -> Result<SessionTokens, ApiError> {
    let keys = JwtKeys::from_ref(st);
    let access_token = keys.sign_access(user)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    RefreshTokens::store_rotating(&st.db, user.id, &refresh_token, keys.refresh_expiry()).await?;
    Ok(SessionTokens {
        user: public(user),
        access_token,
        refresh_token,
    })
}

fn public(user: &User) -> PublicUser {
    PublicUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_emails_pass() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn invalid_emails_fail() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn emails_are_case_normalized() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }
}
