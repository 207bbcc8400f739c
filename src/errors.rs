use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::store::StoreError;

/// Outcome of a core operation that did not succeed.
///
/// Validation, authorization and conflict outcomes are expected and carry the
/// message shown to the user. `Store` is a persistence failure.
#[derive(Debug)]
pub enum CoreError {
    Validation(String),
    Authorization(String),
    Conflict(String),
    NotFound(String),
    Store(StoreError),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        CoreError::Authorization(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Message suitable for an `?error=` redirect.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Validation(msg)
            | CoreError::Authorization(msg)
            | CoreError::Conflict(msg)
            | CoreError::NotFound(msg) => f.write_str(msg),
            CoreError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        log::error!("Store failure: {e}");
        CoreError::Store(e)
    }
}

#[derive(Debug)]
pub enum AppError {
    Session(String),
    Csrf,
    NotFound,
    Store(StoreError),
    Hash(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Session error: {e}"),
            AppError::Csrf => write!(f, "Invalid or missing CSRF token"),
            AppError::NotFound => write!(f, "Not found"),
            AppError::Store(e) => write!(f, "Database error: {e}"),
            AppError::Hash(e) => write!(f, "Hash error: {e}"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound => HttpResponse::NotFound().body("Not Found"),
            AppError::Csrf => HttpResponse::Forbidden().body("Invalid or missing CSRF token"),
            _ => {
                log::error!("{self}");
                HttpResponse::InternalServerError().body("Internal Server Error")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl From<actix_session::SessionInsertError> for AppError {
    fn from(e: actix_session::SessionInsertError) -> Self {
        AppError::Session(e.to_string())
    }
}

impl From<actix_session::SessionGetError> for AppError {
    fn from(e: actix_session::SessionGetError) -> Self {
        AppError::Session(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_display_their_message_verbatim() {
        assert_eq!(
            CoreError::authorization("You are not assigned to this decision.").to_string(),
            "You are not assigned to this decision."
        );
        assert_eq!(
            CoreError::Store(StoreError::Duplicate("users_email_key".into())).user_message(),
            "Duplicate users_email_key"
        );
    }
}
