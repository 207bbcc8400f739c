//! Form field checks. Each returns the user-facing message on failure.

use uuid::Uuid;

/// Optional free-text fields are capped at this many characters.
pub const MAX_OPTIONAL_LEN: usize = 1000;

/// Must contain '@' and '.', max 254 chars.
pub fn validate_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    let valid = trimmed.len() <= 254
        && !trimmed.contains(char::is_whitespace)
        && match trimmed.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
            None => false,
        };
    if valid {
        None
    } else {
        Some("Enter a valid email address.".to_string())
    }
}

pub fn validate_password(password: &str) -> Option<String> {
    if password.chars().count() < 6 {
        return Some("Password must be at least 6 characters.".to_string());
    }
    None
}

/// Required text with a minimum trimmed length.
pub fn validate_min_len(value: &str, field_name: &str, min: usize) -> Option<String> {
    if value.trim().chars().count() < min {
        return Some(format!("{field_name} must be at least {min} characters."));
    }
    None
}

/// Optional text with a max length (empty is OK).
pub fn validate_optional(value: &str, field_name: &str, max_len: usize) -> Option<String> {
    if value.trim().chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters."));
    }
    None
}

/// Trimmed value, or `None` when blank.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a UUID form value, reporting `message` on failure.
pub fn parse_uuid(value: &str, message: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|_| message.to_string())
}

/// First failure among several checks, in order.
pub fn first_error<I>(checks: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    checks.into_iter().flatten().next()
}
