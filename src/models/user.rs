use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A registered account. The password hash never leaves the auth layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The signed-in caller, as the session knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}
