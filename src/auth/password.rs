//! Password hashing and validation.
//!
//! Hashes are Argon2id PHC strings; the salt and parameters travel inside
//! the hash, so changing the parameters below does not break old hashes.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::HangarError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    /// Password contains characters other than letters and digits.
    #[error("password must contain only letters and digits")]
    NotAlphanumeric,

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Password hash is invalid.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password does not match the stored hash.
    #[error("password verification failed")]
    VerificationFailed,
}

impl From<PasswordError> for HangarError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort | PasswordError::TooLong | PasswordError::NotAlphanumeric => {
                HangarError::Validation(err.to_string())
            }
            PasswordError::VerificationFailed => HangarError::Auth("invalid credentials".to_string()),
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                HangarError::Internal(err.to_string())
            }
        }
    }
}

/// Argon2id with 64 MiB memory, 3 iterations and 4 lanes.
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(65536, 3, 4, None).map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password with a fresh random salt.
///
/// ```
/// use game_hangar::auth::hash_password;
///
/// let hash = hash_password("pw12pw12").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = create_argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash in constant time.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    // Parameters come from the parsed hash.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Length rules applied at registration.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Rules for a password sent in the `Password` header of a reset.
///
/// Header values are restricted, so only letters and digits are accepted.
pub fn validate_reset_password(password: &str) -> Result<(), PasswordError> {
    validate_password(password)?;
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PasswordError::NotAlphanumeric);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_success() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("pw12pw12").unwrap();
        assert!(verify_password("pw12pw12", &hash).is_ok());
        assert!(matches!(
            verify_password("pw12pw13", &hash),
            Err(PasswordError::VerificationFailed)
        ));
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(matches!(
            verify_password("any_password", "not_a_valid_hash"),
            Err(PasswordError::InvalidHash)
        ));
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(matches!(validate_password("short"), Err(PasswordError::TooShort)));
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"a".repeat(128)).is_ok());
        assert!(matches!(
            validate_password(&"a".repeat(129)),
            Err(PasswordError::TooLong)
        ));
    }

    #[test]
    fn test_validate_password_counts_characters() {
        // 8 characters, 16 bytes
        assert!(validate_password("пароль12").is_ok());
    }

    #[test]
    fn test_validate_reset_password() {
        assert!(validate_reset_password("abc12345").is_ok());
        assert!(matches!(
            validate_reset_password("abc 12345"),
            Err(PasswordError::NotAlphanumeric)
        ));
        assert!(matches!(
            validate_reset_password("abc1"),
            Err(PasswordError::TooShort)
        ));
    }

    #[test]
    fn test_error_mapping() {
        let err: HangarError = PasswordError::TooShort.into();
        assert!(matches!(err, HangarError::Validation(_)));
        let err: HangarError = PasswordError::VerificationFailed.into();
        assert!(matches!(err, HangarError::Auth(_)));
        let err: HangarError = PasswordError::InvalidHash.into();
        assert!(matches!(err, HangarError::Internal(_)));
    }
}
