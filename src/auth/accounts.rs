//! Sign-up and sign-in against the store.
//!
//! Hashing happens in the handlers (`auth::password`), so these functions only
//! see hashes and never fail on argon2 errors.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::password;
use crate::errors::CoreError;
use crate::models::user::{Identity, User};
use crate::store::{Store, StoreError};
use crate::validate;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Field checks of the sign-up form.
pub fn validate_sign_up(email: &str, password: &str) -> Result<(), CoreError> {
    match validate::first_error([validate::validate_email(email), validate::validate_password(password)]) {
        Some(err) => Err(CoreError::Validation(err)),
        None => Ok(()),
    }
}

/// Register a user with an already hashed password.
pub async fn create_account(store: &dyn Store, email: &str, password_hash: String) -> Result<Identity, CoreError> {
    let email = email.trim().to_string();
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(CoreError::conflict("An account with that email already exists."));
    }
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash,
        created_at: Utc::now(),
    };
    match store.create_user(&user).await {
        Ok(()) => {}
        Err(StoreError::Duplicate(_)) => {
            return Err(CoreError::conflict("An account with that email already exists."));
        }
        Err(e) => return Err(e.into()),
    }
    log::info!("Account {} created", user.id);
    Ok(Identity {
        user_id: user.id,
        email: user.email,
    })
}

/// Check credentials. Unknown email and wrong password look the same.
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> Result<Identity, CoreError> {
    let Some(user) = store.find_user_by_email(email.trim()).await? else {
        return Err(CoreError::validation(INVALID_CREDENTIALS));
    };
    match password::verify_password(password, &user.password_hash) {
        Ok(true) => Ok(Identity {
            user_id: user.id,
            email: user.email,
        }),
        Ok(false) => Err(CoreError::validation(INVALID_CREDENTIALS)),
        Err(e) => {
            log::warn!("Stored hash for user {} could not be parsed: {e}", user.id);
            Err(CoreError::validation(INVALID_CREDENTIALS))
        }
    }
}
