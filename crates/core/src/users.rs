//! Account field validation and normalization.

use validator::ValidateEmail;

use crate::error::CoreError;

/// Minimum password length enforced on registration, creation and reset.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum length of a username.
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Trim and lowercase an email address. Emails are stored in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize an email address and check that it has a valid shape.
///
/// Returns the normalized address.
pub fn validate_email(email: &str) -> Result<String, CoreError> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return Err(CoreError::Validation("Please add an email".to_string()));
    }
    if !normalized.validate_email() {
        return Err(CoreError::Validation(
            "Please add a valid email".to_string(),
        ));
    }
    Ok(normalized)
}

/// Validate and trim a username.
pub fn validate_username(username: &str) -> Result<String, CoreError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Username is required".to_string()));
    }
    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Username exceeds maximum length of {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "Username must not contain whitespace".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate that a password meets minimum strength requirements.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), CoreError> {
    if password.chars().count() < min_length {
        return Err(CoreError::Validation(format!(
            "Password must be at least {min_length} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_lowercased_and_trimmed() {
        assert_eq!(validate_email("  Alice@X.com ").unwrap(), "alice@x.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("alice@").is_err());
    }

    #[test]
    fn username_rules() {
        assert_eq!(validate_username(" alice ").unwrap(), "alice");
        assert!(validate_username("").is_err());
        assert!(validate_username("two words").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn password_too_short() {
        let err = validate_password_strength("abc", MIN_PASSWORD_LENGTH).unwrap_err();
        assert!(err.to_string().contains("at least 6 characters"));
    }

    #[test]
    fn password_meets_minimum() {
        assert!(validate_password_strength("secret1", MIN_PASSWORD_LENGTH).is_ok());
        assert!(validate_password_strength("sixsix", MIN_PASSWORD_LENGTH).is_ok());
    }
}
