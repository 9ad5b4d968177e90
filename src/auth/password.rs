//! Password hashing for MyCloud.
//!
//! Uses Argon2id; the PHC string (algorithm, parameters, salt, hash) is
//! what gets stored.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::CloudError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    TooLong,

    #[error("password hashing failed: {0}")]
    HashError(String),

    #[error("invalid password hash format")]
    InvalidHash,

    /// Wrong password.
    #[error("password verification failed")]
    VerificationFailed,
}

impl From<PasswordError> for CloudError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::TooLong => CloudError::Validation(e.to_string()),
            PasswordError::VerificationFailed => CloudError::Auth("invalid password".to_string()),
            PasswordError::HashError(_) | PasswordError::InvalidHash => {
                CloudError::Auth(e.to_string())
            }
        }
    }
}

/// Argon2id with m=19 MiB, t=2, p=1.
fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params =
        Params::new(19 * 1024, 2, 1, None).map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password using Argon2id.
///
/// # Examples
///
/// ```
/// use mycloud::hash_password;
///
/// let hash = hash_password("my_secure_password").unwrap();
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

/// Verify a password against a stored hash.
///
/// Parameters come from the stored hash, so hashes made with older
/// parameters keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Check the password length limits (in characters).
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct_password").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
        assert!(hash.contains("m=19456,t=2,p=1"));

        assert!(verify_password("correct_password", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong_password", &hash),
            Err(PasswordError::VerificationFailed)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
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
    fn test_length_counts_characters() {
        // 8 characters, 24 bytes.
        assert!(validate_password("パスワードです。").is_ok());
        assert!(validate_password("パスワード").is_err());
    }

    #[test]
    fn test_error_conversion() {
        assert!(matches!(
            CloudError::from(PasswordError::TooShort),
            CloudError::Validation(_)
        ));
        assert!(matches!(
            CloudError::from(PasswordError::VerificationFailed),
            CloudError::Auth(_)
        ));
    }
}
