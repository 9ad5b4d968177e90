//! Input validation for account fields.

use thiserror::Error;

use crate::CloudError;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 4;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 20;

/// Maximum display name length.
pub const MAX_FULL_NAME_LENGTH: usize = 150;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "username must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} characters"
    )]
    UsernameLength,

    #[error("username must start with a letter and contain only letters and digits")]
    UsernameInvalidChars,

    #[error("full name cannot be empty")]
    FullNameEmpty,

    #[error("full name must be at most {MAX_FULL_NAME_LENGTH} characters")]
    FullNameTooLong,

    #[error("full name contains invalid characters")]
    FullNameInvalidChars,

    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    #[error("invalid email format")]
    EmailInvalidFormat,
}

impl From<ValidationError> for CloudError {
    fn from(e: ValidationError) -> Self {
        CloudError::Validation(e.to_string())
    }
}

/// Validate a username.
///
/// Starts with an ASCII letter, followed by 3 to 19 ASCII letters or digits.
///
/// ```
/// use mycloud::auth::validation::validate_username;
///
/// assert!(validate_username("alice1").is_ok());
/// assert!(validate_username("1alice").is_err());
/// assert!(validate_username("bob").is_err());
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameLength);
    }
    let mut chars = username.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::UsernameInvalidChars);
    }
    Ok(())
}

/// Validate a display name: non-blank, bounded, no control characters.
pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.trim().is_empty() {
        return Err(ValidationError::FullNameEmpty);
    }
    if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::FullNameTooLong);
    }
    if full_name.chars().any(char::is_control) {
        return Err(ValidationError::FullNameInvalidChars);
    }
    Ok(())
}

/// Validate an email address.
///
/// Only the shape is checked: one `@`, a non-empty local part, and a
/// dotted domain without spaces.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty()
        || !domain_ok
        || domain.contains('@')
        || email.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::EmailInvalidFormat);
    }
    Ok(())
}

/// Validate all account fields (password limits are checked by hashing).
pub fn validate_account(
    username: &str,
    email: &str,
    full_name: &str,
) -> Result<(), ValidationError> {
    validate_username(username)?;
    validate_email(email)?;
    validate_full_name(full_name)?;
    Ok(())
}
