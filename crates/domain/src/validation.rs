//! Request-level validation helpers.

use crate::ValidationError;

/// Minimal syntactic email check.
///
/// Requires at least 5 characters, exactly one `@`, a non-empty local part
/// and a domain of at least 3 characters containing a dot.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new(format!("invalid email format: {email}"));
    if email.len() < 5 {
        return Err(invalid());
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if local.is_empty() || domain.len() < 3 || !domain.contains('.') {
        return Err(invalid());
    }
    Ok(())
}
