use sqlx::{PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{AuditAction, User, UserRole};

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, status, last_login, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, status, last_login, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a user and its `USER_CREATED` audit entry in one transaction.
    /// A duplicate email surfaces as a unique-constraint violation.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        role: UserRole,
        source_addr: Option<&str>,
    ) -> sqlx::Result<User> {
        let mut tx = db.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role, status, last_login, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&mut *tx)
        .await?;

        audit(
            &mut *tx,
            Some(user.id),
            AuditAction::UserCreated,
            serde_json::json!({ "email": user.email, "role": user.role }),
            source_addr,
        )
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Stamp `last_login` and audit the login.
    pub async fn record_login(
        db: &PgPool,
        user_id: Uuid,
        source_addr: Option<&str>,
    ) -> sqlx::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        audit(
            &mut *tx,
            Some(user_id),
            AuditAction::UserLogin,
            serde_json::json!({}),
            source_addr,
        )
        .await?;
        tx.commit().await
    }
}

/// Refresh-token store. Rotation invariant: at most one non-revoked token
/// per user, enforced by `store_rotating`'s transaction.
pub struct RefreshTokens;

impl RefreshTokens {
    /// Revoke every live token for the user, then insert the new one. Both
    /// statements share one transaction so concurrent logins serialize here.
    pub async fn store_rotating(
        db: &PgPool,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(token)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    /// True only if the exact token is present, not revoked, and not expired.
    pub async fn is_valid(db: &PgPool, user_id: Uuid, token: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM refresh_tokens
                WHERE user_id = $1 AND token = $2 AND revoked = FALSE
                  AND expires_at > now()
            )
            "#,
        )
        .bind(user_id)
        .bind(token)
        .fetch_one(db)
        .await
    }

    /// Rotate on refresh: the old token string is the match key. Returns the
    /// number of rows updated; zero means a concurrent rotation won.
    pub async fn replace(
        db: &PgPool,
        user_id: Uuid,
        old_token: &str,
        new_token: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token = $1, expires_at = $2, created_at = now()
            WHERE user_id = $3 AND token = $4 AND revoked = FALSE
            "#,
        )
        .bind(new_token)
        .bind(expires_at)
        .bind(user_id)
        .bind(old_token)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn revoke_all(db: &PgPool, user_id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete tokens past expiry, and revoked tokens older than the
    /// retention window.
    pub async fn purge(db: &PgPool, retention_days: i32) -> sqlx::Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE expires_at < now()
               OR (revoked AND created_at < now() - ($1 * interval '1 day'))
            "#,
        )
        .bind(retention_days)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Append-only login-attempt log, queried over sliding windows.
pub struct LoginAttempts;

impl LoginAttempts {
    pub async fn record(
        db: &PgPool,
        email: &str,
        source_addr: Option<&str>,
        success: bool,
    ) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO login_attempts (email, ip_address, success) VALUES ($1, $2, $3)")
            .bind(email)
            .bind(source_addr)
            .bind(success)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn recent_count(
        db: &PgPool,
        email: &str,
        window_minutes: i32,
    ) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM login_attempts
            WHERE email = $1 AND attempt_time > now() - ($2 * interval '1 minute')
            "#,
        )
        .bind(email)
        .bind(window_minutes)
        .fetch_one(db)
        .await
    }

    pub async fn purge_older_than(db: &PgPool, days: i32) -> sqlx::Result<u64> {
        let result =
            sqlx::query("DELETE FROM login_attempts WHERE attempt_time < now() - ($1 * interval '1 day')")
                .bind(days)
                .execute(db)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Append an audit entry. Takes any executor so callers can write inside
/// their own transaction.
pub async fn audit<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    action: AuditAction,
    details: serde_json::Value,
    source_addr: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (user_id, action, details, ip_address) VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(action.as_str())
    .bind(details)
    .bind(source_addr)
    .execute(executor)
    .await?;
    Ok(())
}
