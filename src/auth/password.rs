use crate::error::ApiError;

/// Fixed bcrypt work factor.
const BCRYPT_COST: u32 = 12;

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    Ok(bcrypt::hash(plain, BCRYPT_COST)?)
}

/// Constant-time comparison against a stored digest. A mismatch returns
/// `Ok(false)`; only a malformed digest or library failure is an error.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, ApiError> {
    Ok(bcrypt::verify(plain, hash)?)
}

/// Registration password policy: at least 6 characters, at least one letter
/// and one digit.
pub fn check_password_policy(plain: &str) -> Result<(), ApiError> {
    if plain.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    let has_letter = plain.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = plain.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(ApiError::Validation(
            "Password must contain at least one letter and one number".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "abc123";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-1").expect("hashing should succeed");
        assert!(!verify_password("wrong-password-2", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn policy_accepts_letter_and_digit() {
        assert!(check_password_policy("abc123").is_ok());
    }

    #[test]
    fn policy_rejects_short_password() {
        assert!(check_password_policy("a1").is_err());
    }

    #[test]
    fn policy_rejects_missing_digit() {
        assert!(check_password_policy("abcdef").is_err());
    }

    #[test]
    fn policy_rejects_missing_letter() {
        assert!(check_password_policy("123456").is_err());
    }
}
