use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::UserRole;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Response for register, login and refresh. The refresh token travels only
/// in the HTTP-only cookie, never in this body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_serializes_user_and_token_only() {
        let response = AuthResponse {
            user: PublicUser {
                id: Uuid::new_v4(),
                email: "test@example.com".to_string(),
                role: UserRole::User,
            },
            token: "signed.jwt.here".to_string(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["email"], "test@example.com");
        assert_eq!(json["user"]["role"], "user");
        assert_eq!(json["token"], "signed.jwt.here");
        assert!(json.get("refresh_token").is_none());
    }
}
