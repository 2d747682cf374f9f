use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::UserRole;

/// Payload of a short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,      // user ID
    pub email: String,  // user email
    pub role: UserRole, // user or admin
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
}

/// Payload of a refresh token. Carries only the subject; everything else is
/// looked up in the store when the token is presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}
