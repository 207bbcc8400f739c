use actix_session::Session;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Identity;

pub fn get_user_id(session: &Session) -> Option<Uuid> {
    session
        .get::<String>("user_id")
        .unwrap_or(None)
        .and_then(|raw| Uuid::parse_str(&raw).ok())
}

/// The signed-in user, or a session error when the cookie lacks one.
pub fn get_identity(session: &Session) -> Result<Identity, AppError> {
    let user_id = get_user_id(session).ok_or_else(|| AppError::Session("User not logged in".to_string()))?;
    let email = session
        .get::<String>("email")?
        .ok_or_else(|| AppError::Session("No email in session".to_string()))?;
    Ok(Identity { user_id, email })
}

pub fn sign_in(session: &Session, identity: &Identity) -> Result<(), AppError> {
    session.renew();
    session.insert("user_id", identity.user_id.to_string())?;
    session.insert("email", &identity.email)?;
    Ok(())
}

pub fn set_flash(session: &Session, message: &str) {
    let _ = session.insert("flash", message);
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}
