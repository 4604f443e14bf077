//! Input checks applied before anything is sent to the server.

use thiserror::Error;

/// Minimum length for first and last names
const MIN_NAME_LENGTH: usize = 2;

/// Minimum password length
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Names must be at least 2 characters")]
    InvalidName,

    #[error("Password must be at least 8 characters and contain a lowercase letter, an uppercase letter and a digit")]
    InvalidPasswordFormat,

    #[error("Password is required")]
    MissingPassword,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;

    let domain_ok = !domain.contains('@')
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.');

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Names are optional, but when given must be long enough
pub fn validate_name(name: Option<&str>) -> Result<(), ValidationError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() && n.chars().count() < MIN_NAME_LENGTH => {
            Err(ValidationError::InvalidName)
        }
        _ => Ok(()),
    }
}

pub fn validate_new_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_lower && has_upper && has_digit {
        Ok(())
    } else {
        Err(ValidationError::InvalidPasswordFormat)
    }
}

pub fn validate_present(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        Err(ValidationError::MissingPassword)
    } else {
        Ok(())
    }
}

pub fn validate_confirmation(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password == confirmation {
        Ok(())
    } else {
        Err(ValidationError::PasswordMismatch)
    }
}

/// Blank optional fields are sent as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
